use itertools::Itertools;

use crate::logic::errors::{BranchErrors, FieldErrors};
use crate::model::branch::{Branch, BranchInput, FeatureValue, Screenshot};
use crate::model::common::{generate_id, slugify, Id};
use crate::model::constants::{
    ERROR_BRANCH_NO_ENABLED, ERROR_BRANCH_NO_VALUE, ERROR_DUPLICATE_BRANCH_FEATURE_VALUE,
    ERROR_DUPLICATE_BRANCH_NAME, ERROR_NAME_INVALID,
};
use crate::model::experiment::{Application, ExperimentUpdate};

/// Validation and persistence-shaping for a single branch and for the
/// branch set of one experiment update.
pub struct BranchOperations;

impl BranchOperations {
    /// Per-branch structural checks, accumulated field-by-field.
    pub fn validate_input(input: &BranchInput) -> BranchErrors {
        let mut errors = BranchErrors::default();

        if input.slug().is_empty() {
            errors.add("name", ERROR_NAME_INVALID);
        }

        // Legacy single-feature pair.
        let enabled = input.feature_enabled.unwrap_or(false);
        let value = input.feature_value.as_deref().unwrap_or("");
        if enabled && value.is_empty() {
            errors.add("value", ERROR_BRANCH_NO_VALUE);
        }
        if !value.is_empty() && !enabled {
            errors.add("enabled", ERROR_BRANCH_NO_ENABLED);
        }

        if let Some(feature_values) = &input.feature_values {
            for entry in feature_values {
                let enabled = entry.enabled.unwrap_or(false);
                let value = entry.value.as_deref().unwrap_or("");
                if enabled && value.is_empty() {
                    errors.add("value", ERROR_BRANCH_NO_VALUE);
                }
                if !value.is_empty() && !enabled {
                    errors.add("enabled", ERROR_BRANCH_NO_ENABLED);
                }
            }

            // Duplicate feature config across entries: one error per entry,
            // matching the incoming list length.
            let configs: Vec<&Id> = feature_values
                .iter()
                .filter_map(|fv| fv.feature_config.as_ref())
                .collect();
            if configs.len() == feature_values.len()
                && configs.iter().unique().count() != configs.len()
            {
                for _ in feature_values {
                    errors.add("featureValues", ERROR_DUPLICATE_BRANCH_FEATURE_VALUE);
                }
            }
        }

        errors
    }

    /// Branch-set validation for an experiment update: duplicate names
    /// across reference + treatments flag every colliding entry, then each
    /// branch is validated on its own.
    pub fn validate_branch_set(update: &ExperimentUpdate, errors: &mut FieldErrors) {
        if let (Some(reference), Some(treatments)) =
            (&update.reference_branch, &update.treatment_branches)
        {
            let all_names: Vec<&str> = std::iter::once(reference.name.as_str())
                .chain(treatments.iter().map(|b| b.name.as_str()))
                .collect();
            if all_names.iter().unique().count() != all_names.len() {
                errors
                    .reference_branch
                    .add("name", ERROR_DUPLICATE_BRANCH_NAME);
                for index in 0..treatments.len() {
                    errors
                        .treatment_branch(index)
                        .add("name", ERROR_DUPLICATE_BRANCH_NAME);
                }
            }
        }

        if let Some(reference) = &update.reference_branch {
            let branch_errors = Self::validate_input(reference);
            for (field, messages) in branch_errors.0 {
                for message in messages {
                    errors.reference_branch.add(field.clone(), message);
                }
            }
        }

        if let Some(treatments) = &update.treatment_branches {
            errors.align_treatment_branches(treatments.len());
            for (index, branch) in treatments.iter().enumerate() {
                let branch_errors = Self::validate_input(branch);
                for (field, messages) in branch_errors.0 {
                    for message in messages {
                        errors.treatment_branch(index).add(field.clone(), message);
                    }
                }
            }
        }
    }

    /// Build the persisted branch from a validated input. An existing
    /// branch (matched by id upstream) contributes its screenshots for
    /// reconciliation; feature values are always replaced wholesale.
    pub fn materialize(
        existing: Option<&Branch>,
        input: &BranchInput,
        default_feature_config: Option<&Id>,
        application: Application,
    ) -> Branch {
        let mut branch = match existing {
            Some(existing) => existing.clone(),
            None => Branch {
                id: input.id.clone().unwrap_or_else(generate_id),
                name: String::new(),
                slug: String::new(),
                description: String::new(),
                ratio: 1,
                feature_values: Vec::new(),
                screenshots: Vec::new(),
            },
        };

        branch.name = input.name.clone();
        branch.slug = slugify(&input.name);
        if let Some(description) = &input.description {
            branch.description = description.clone();
        }
        if let Some(ratio) = input.ratio {
            branch.ratio = ratio;
        }

        branch.feature_values =
            Self::build_feature_values(input, default_feature_config, application);

        if let Some(screenshots) = &input.screenshots {
            branch.screenshots = Self::reconcile_screenshots(&branch.screenshots, screenshots);
        }

        branch
    }

    /// Replace-not-merge: previous feature values are dropped and rebuilt
    /// from whichever payload form was supplied. Only Desktop supports a
    /// disabled feature; every other application forces `enabled`.
    fn build_feature_values(
        input: &BranchInput,
        default_feature_config: Option<&Id>,
        application: Application,
    ) -> Vec<FeatureValue> {
        let force_enabled = application != Application::Desktop;

        if let Some(value) = &input.feature_value {
            let enabled = input.feature_enabled.unwrap_or(false) || force_enabled;
            return vec![FeatureValue {
                feature_config: default_feature_config.cloned(),
                enabled,
                value: value.clone(),
            }];
        }

        if let Some(entries) = &input.feature_values {
            return entries
                .iter()
                .map(|entry| FeatureValue {
                    feature_config: entry.feature_config.clone(),
                    enabled: entry.enabled.unwrap_or(false) || force_enabled,
                    value: entry.value.clone().unwrap_or_default(),
                })
                .collect();
        }

        Vec::new()
    }

    /// Reconcile by id: matching ids update in place, ids absent from the
    /// incoming set are deleted, entries without an id are created.
    fn reconcile_screenshots(
        existing: &[Screenshot],
        incoming: &[crate::model::branch::ScreenshotInput],
    ) -> Vec<Screenshot> {
        let mut result = Vec::with_capacity(incoming.len());

        for screenshot in existing {
            if let Some(update) = incoming
                .iter()
                .find(|i| i.id.as_deref() == Some(screenshot.id.as_str()))
            {
                let mut updated = screenshot.clone();
                if let Some(description) = &update.description {
                    updated.description = description.clone();
                }
                if let Some(image) = &update.image {
                    updated.image = Some(image.clone());
                }
                result.push(updated);
            }
            // Existing ids missing from the payload are dropped.
        }

        for entry in incoming.iter().filter(|i| i.id.is_none()) {
            result.push(Screenshot {
                id: generate_id(),
                description: entry.description.clone().unwrap_or_default(),
                image: entry.image.clone(),
            });
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::branch::{FeatureValueInput, ScreenshotInput};

    #[test]
    fn branch_name_must_slugify_to_something() {
        let errors = BranchOperations::validate_input(&BranchInput::named("***"));
        assert_eq!(errors.0.get("name").unwrap()[0], ERROR_NAME_INVALID);
    }

    #[test]
    fn enabled_without_value_and_value_without_enabled() {
        let mut input = BranchInput::named("Control");
        input.feature_enabled = Some(true);
        input.feature_value = Some(String::new());
        let errors = BranchOperations::validate_input(&input);
        assert_eq!(errors.0.get("value").unwrap()[0], ERROR_BRANCH_NO_VALUE);

        let mut input = BranchInput::named("Control");
        input.feature_enabled = Some(false);
        input.feature_value = Some("x".into());
        let errors = BranchOperations::validate_input(&input);
        assert_eq!(errors.0.get("enabled").unwrap()[0], ERROR_BRANCH_NO_ENABLED);
    }

    #[test]
    fn duplicate_feature_config_flags_every_entry() {
        let mut input = BranchInput::named("Control");
        input.feature_values = Some(vec![
            FeatureValueInput {
                feature_config: Some("feature-a".into()),
                enabled: Some(true),
                value: Some("{}".into()),
            },
            FeatureValueInput {
                feature_config: Some("feature-a".into()),
                enabled: Some(true),
                value: Some("{}".into()),
            },
        ]);
        let errors = BranchOperations::validate_input(&input);
        assert_eq!(errors.0.get("featureValues").unwrap().len(), 2);
    }

    #[test]
    fn duplicate_branch_names_flag_reference_and_all_treatments() {
        let update = ExperimentUpdate {
            reference_branch: Some(BranchInput::named("Control")),
            treatment_branches: Some(vec![
                BranchInput::named("Control"),
                BranchInput::named("Variant"),
            ]),
            ..ExperimentUpdate::default()
        };
        let mut errors = FieldErrors::default();
        BranchOperations::validate_branch_set(&update, &mut errors);
        assert_eq!(
            errors.reference_branch.0.get("name").unwrap()[0],
            ERROR_DUPLICATE_BRANCH_NAME
        );
        assert_eq!(errors.treatment_branches.len(), 2);
        for branch in &errors.treatment_branches {
            assert_eq!(branch.0.get("name").unwrap()[0], ERROR_DUPLICATE_BRANCH_NAME);
        }
    }

    #[test]
    fn legacy_pair_maps_to_default_feature_config() {
        let mut input = BranchInput::named("Control");
        input.feature_enabled = Some(true);
        input.feature_value = Some(r#"{"on": true}"#.into());
        let default = Id::from("feature-a");
        let branch =
            BranchOperations::materialize(None, &input, Some(&default), Application::Desktop);
        assert_eq!(branch.feature_values.len(), 1);
        assert_eq!(
            branch.feature_values[0].feature_config.as_deref(),
            Some("feature-a")
        );
        assert!(branch.feature_values[0].enabled);
    }

    #[test]
    fn non_desktop_forces_enabled() {
        let mut input = BranchInput::named("Control");
        input.feature_values = Some(vec![FeatureValueInput {
            feature_config: Some("feature-a".into()),
            enabled: Some(false),
            value: None,
        }]);
        let branch = BranchOperations::materialize(None, &input, None, Application::Fenix);
        assert!(branch.feature_values[0].enabled);
    }

    #[test]
    fn feature_values_are_replaced_not_merged() {
        let mut input = BranchInput::named("Control");
        input.feature_values = Some(vec![FeatureValueInput {
            feature_config: Some("feature-a".into()),
            enabled: Some(true),
            value: Some("{}".into()),
        }]);
        let first = BranchOperations::materialize(None, &input, None, Application::Desktop);

        let mut second_input = BranchInput::named("Control");
        second_input.id = Some(first.id.clone());
        second_input.feature_values = Some(vec![FeatureValueInput {
            feature_config: Some("feature-b".into()),
            enabled: Some(true),
            value: Some(r#"{"v":2}"#.into()),
        }]);
        let second = BranchOperations::materialize(
            Some(&first),
            &second_input,
            None,
            Application::Desktop,
        );
        assert_eq!(second.feature_values.len(), 1);
        assert_eq!(
            second.feature_values[0].feature_config.as_deref(),
            Some("feature-b")
        );
    }

    #[test]
    fn screenshots_reconcile_by_id() {
        let mut input = BranchInput::named("Control");
        input.screenshots = Some(vec![
            ScreenshotInput {
                id: None,
                description: Some("first".into()),
                image: Some("a.png".into()),
            },
            ScreenshotInput {
                id: None,
                description: Some("second".into()),
                image: Some("b.png".into()),
            },
        ]);
        let branch = BranchOperations::materialize(None, &input, None, Application::Desktop);
        assert_eq!(branch.screenshots.len(), 2);
        let kept_id = branch.screenshots[0].id.clone();

        // Keep the first (updated), drop the second, add a third.
        let mut update = BranchInput::named("Control");
        update.id = Some(branch.id.clone());
        update.screenshots = Some(vec![
            ScreenshotInput {
                id: Some(kept_id.clone()),
                description: Some("first updated".into()),
                image: None,
            },
            ScreenshotInput {
                id: None,
                description: Some("third".into()),
                image: Some("c.png".into()),
            },
        ]);
        let updated =
            BranchOperations::materialize(Some(&branch), &update, None, Application::Desktop);
        assert_eq!(updated.screenshots.len(), 2);
        assert_eq!(updated.screenshots[0].id, kept_id);
        assert_eq!(updated.screenshots[0].description, "first updated");
        assert_eq!(updated.screenshots[0].image.as_deref(), Some("a.png"));
        assert_eq!(updated.screenshots[1].description, "third");
    }
}
