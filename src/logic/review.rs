use std::collections::BTreeMap;

use crate::logic::errors::{BranchErrors, FieldErrors, OperationError};
use crate::logic::schema_check::{SchemaCheck, ValueCheck};
use crate::model::constants::{
    ERROR_FEATURE_ENABLED, ERROR_FIREFOX_VERSION_MAX, ERROR_FIREFOX_VERSION_MIN,
    ERROR_HYPOTHESIS_DEFAULT, ERROR_POPULATION_PERCENT_MIN, ERROR_REQUIRED_FEATURE_CONFIG,
    ERROR_REQUIRED_FIELD, ERROR_REQUIRED_QUESTION, ERROR_SINGLE_BRANCH_FOR_ROLLOUT,
    FEATURE_ENABLED_MIN_REQUIRED_VERSION, HYPOTHESIS_DEFAULT, POPULATION_PERCENT_MIN,
};
use crate::model::experiment::{Application, Channel, Experiment};
use crate::model::reference::{ApplicationConfig, FeatureConfig};
use crate::model::Branch;
use crate::store::traits::Store;

/// Schema-mismatch messages demoted to warnings when the experiment opts
/// in via `warn_feature_schema`. Same per-branch shape as errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewWarnings {
    pub reference_branch: BranchErrors,
    pub treatment_branches: Vec<BranchErrors>,
}

impl ReviewWarnings {
    pub fn is_empty(&self) -> bool {
        self.reference_branch.is_empty()
            && self.treatment_branches.iter().all(BranchErrors::is_empty)
    }

    fn slot(&mut self, index: Option<usize>) -> &mut BranchErrors {
        match index {
            None => &mut self.reference_branch,
            Some(i) => {
                while self.treatment_branches.len() <= i {
                    self.treatment_branches.push(BranchErrors::default());
                }
                &mut self.treatment_branches[i]
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewResult {
    pub errors: FieldErrors,
    pub warnings: ReviewWarnings,
}

impl ReviewResult {
    /// Warnings alone do not block launch.
    pub fn is_ready(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Readiness check applied when an experiment is put up for launch review.
/// Read-only: inspects the saved aggregate and never blocks ordinary draft
/// saves.
pub struct ReviewValidator;

impl ReviewValidator {
    pub async fn validate<S: Store>(
        store: &S,
        experiment: &Experiment,
    ) -> Result<ReviewResult, OperationError> {
        let mut result = ReviewResult::default();
        let app_config = store.application_config(experiment.application).await?;

        let mut feature_configs = BTreeMap::new();
        for slug in &experiment.feature_configs {
            if let Some(config) = store.get_feature_config(slug).await? {
                feature_configs.insert(slug.clone(), config);
            }
        }

        Self::check_required_fields(experiment, &mut result.errors);
        Self::check_versions(experiment, &mut result.errors);
        Self::check_channel(experiment, &mut result.errors);
        Self::check_targeting(store, experiment, &mut result.errors).await?;
        Self::check_version_gates(experiment, app_config.as_ref(), &mut result.errors);
        Self::check_feature_configs(experiment, &feature_configs, &mut result.errors);
        Self::check_branches(experiment, &feature_configs, &mut result);

        Ok(result)
    }

    fn check_required_fields(experiment: &Experiment, errors: &mut FieldErrors) {
        if experiment.public_description.trim().is_empty() {
            errors.add("publicDescription", ERROR_REQUIRED_FIELD);
        }
        if experiment.hypothesis.trim().is_empty() {
            errors.add("hypothesis", ERROR_REQUIRED_FIELD);
        } else if experiment.hypothesis.trim() == HYPOTHESIS_DEFAULT.trim() {
            errors.add("hypothesis", ERROR_HYPOTHESIS_DEFAULT);
        }
        match experiment.proposed_duration {
            None => errors.add("proposedDuration", ERROR_REQUIRED_FIELD),
            Some(0) => errors.add(
                "proposedDuration",
                "Ensure this value is greater than or equal to 1.",
            ),
            Some(_) => {}
        }
        match experiment.proposed_enrollment {
            None => errors.add("proposedEnrollment", ERROR_REQUIRED_FIELD),
            Some(0) => errors.add(
                "proposedEnrollment",
                "Ensure this value is greater than or equal to 1.",
            ),
            Some(_) => {}
        }
        if experiment.population_percent <= POPULATION_PERCENT_MIN {
            errors.add("populationPercent", ERROR_POPULATION_PERCENT_MIN);
        }
        match experiment.total_enrolled_clients {
            None => errors.add("totalEnrolledClients", ERROR_REQUIRED_FIELD),
            Some(0) => errors.add(
                "totalEnrolledClients",
                "Ensure this value is greater than or equal to 1.",
            ),
            Some(_) => {}
        }
        if experiment.firefox_min_version.is_none() {
            errors.add("firefoxMinVersion", ERROR_REQUIRED_FIELD);
        }
        if experiment.firefox_max_version.is_none() {
            errors.add("firefoxMaxVersion", ERROR_REQUIRED_FIELD);
        }
        if experiment.targeting_config_slug.is_none() {
            errors.add("targetingConfigSlug", ERROR_REQUIRED_FIELD);
        }
        if experiment.feature_configs.is_empty() {
            errors.add("featureConfigs", ERROR_REQUIRED_FEATURE_CONFIG);
        }
        if experiment.risk_brand.is_none() {
            errors.add("riskBrand", ERROR_REQUIRED_QUESTION);
        }
        if experiment.risk_partner_related.is_none() {
            errors.add("riskPartnerRelated", ERROR_REQUIRED_QUESTION);
        }
        if experiment.risk_revenue.is_none() {
            errors.add("riskRevenue", ERROR_REQUIRED_QUESTION);
        }
        for link in &experiment.documentation_links {
            if link.link.trim().is_empty() {
                errors.add("documentationLinks", ERROR_REQUIRED_FIELD);
            }
        }
        if experiment.reference_branch.is_none() {
            errors.add("referenceBranch", "This field may not be null.");
        }
    }

    fn check_versions(experiment: &Experiment, errors: &mut FieldErrors) {
        if let (Some(min), Some(max)) =
            (experiment.firefox_min_version, experiment.firefox_max_version)
        {
            if min > max {
                errors.add("firefoxMinVersion", ERROR_FIREFOX_VERSION_MIN);
                errors.add("firefoxMaxVersion", ERROR_FIREFOX_VERSION_MAX);
            }
        }
    }

    /// Only Desktop may launch without a branded channel.
    fn check_channel(experiment: &Experiment, errors: &mut FieldErrors) {
        if experiment.application != Application::Desktop
            && experiment.channel == Channel::NoChannel
        {
            errors.add("channel", "This field may not be null.");
        }
    }

    async fn check_targeting<S: Store>(
        store: &S,
        experiment: &Experiment,
        errors: &mut FieldErrors,
    ) -> Result<(), OperationError> {
        let Some(slug) = &experiment.targeting_config_slug else {
            return Ok(());
        };
        let Some(targeting) = store.get_targeting_config(slug).await? else {
            errors.add(
                "targetingConfigSlug",
                format!("Targeting config '{slug}' does not exist"),
            );
            return Ok(());
        };
        if targeting.sticky_required && !experiment.is_sticky {
            errors.add(
                "isSticky",
                "Selected targeting expression requires sticky enrollment to function \
                 correctly for the selected application and version combination.",
            );
        }
        if targeting.is_first_run_required && !experiment.is_first_run {
            errors.add(
                "isFirstRun",
                "Selected targeting expression requires first run to be true.",
            );
        }
        Ok(())
    }

    /// Targeting by language/country and rollouts each need a minimum
    /// client version on non-Desktop applications.
    fn check_version_gates(
        experiment: &Experiment,
        app_config: Option<&ApplicationConfig>,
        errors: &mut FieldErrors,
    ) {
        let Some(app_config) = app_config else { return };
        if experiment.application == Application::Desktop {
            return;
        }
        let Some(min_version) = experiment.firefox_min_version else {
            return;
        };

        if let Some(supported) = app_config.languages_supported_version {
            if !experiment.languages.is_empty() && min_version < supported {
                errors.add(
                    "languages",
                    format!("Language targeting is not supported before version {supported}"),
                );
            }
        }
        if let Some(supported) = app_config.countries_supported_version {
            if !experiment.countries.is_empty() && min_version < supported {
                errors.add(
                    "countries",
                    format!("Country targeting is not supported before version {supported}"),
                );
            }
        }
        if let Some(supported) = app_config.rollout_supported_version {
            if experiment.is_rollout && min_version < supported {
                errors.add(
                    "isRollout",
                    format!("Rollouts are not supported before version {supported}"),
                );
            }
        }
    }

    fn check_feature_configs(
        experiment: &Experiment,
        feature_configs: &BTreeMap<String, FeatureConfig>,
        errors: &mut FieldErrors,
    ) {
        for slug in &experiment.feature_configs {
            match feature_configs.get(slug) {
                None => {
                    errors.add(
                        "featureConfigs",
                        format!("Feature config '{slug}' does not exist"),
                    );
                }
                Some(config) if config.application != experiment.application => {
                    errors.add(
                        "featureConfigs",
                        format!(
                            "Feature Config application '{}' does not match experiment \
                             application '{}'.",
                            config.application.label(),
                            experiment.application.label()
                        ),
                    );
                }
                Some(_) => {}
            }
        }
    }

    fn check_branches(
        experiment: &Experiment,
        feature_configs: &BTreeMap<String, FeatureConfig>,
        result: &mut ReviewResult,
    ) {
        if experiment.is_rollout {
            for (index, _) in experiment.treatment_branches.iter().enumerate() {
                result
                    .errors
                    .treatment_branch(index)
                    .add("name", ERROR_SINGLE_BRANCH_FOR_ROLLOUT);
            }
        }

        if let Some(reference) = &experiment.reference_branch {
            Self::check_branch(experiment, feature_configs, reference, None, result);
        }
        for (index, branch) in experiment.treatment_branches.iter().enumerate() {
            Self::check_branch(experiment, feature_configs, branch, Some(index), result);
        }
    }

    fn check_branch(
        experiment: &Experiment,
        feature_configs: &BTreeMap<String, FeatureConfig>,
        branch: &Branch,
        index: Option<usize>,
        result: &mut ReviewResult,
    ) {
        let ReviewResult { errors, warnings } = result;
        let branch_errors = match index {
            None => &mut errors.reference_branch,
            Some(i) => errors.treatment_branch(i),
        };

        if branch.description.trim().is_empty() {
            branch_errors.add("description", ERROR_REQUIRED_FIELD);
        }

        // Desktop clients past the feature-enabled cutoff ignore disabled
        // feature values, so every branch must enable its feature.
        let enabled_required = experiment.application == Application::Desktop
            && experiment
                .firefox_min_version
                .map(|v| v >= FEATURE_ENABLED_MIN_REQUIRED_VERSION)
                .unwrap_or(false);

        for value in branch.feature_values_sorted() {
            if enabled_required && !value.enabled {
                branch_errors.add("featureEnabled", ERROR_FEATURE_ENABLED);
            }

            // Disabled features carry no payload to validate.
            if !value.enabled {
                continue;
            }

            let schema = value
                .feature_config
                .as_ref()
                .and_then(|slug| feature_configs.get(slug))
                .and_then(|config| config.schema.as_deref());
            match SchemaCheck::check_value(schema, &value.value) {
                ValueCheck::Ok => {}
                ValueCheck::InvalidJson(message) => {
                    // Malformed JSON is never demoted to a warning.
                    branch_errors.add("featureValue", message);
                }
                ValueCheck::SchemaMismatch(messages) => {
                    for message in messages {
                        if experiment.warn_feature_schema {
                            warnings.slot(index).add("featureValue", message);
                        } else {
                            branch_errors.add("featureValue", message);
                        }
                    }
                }
            }
        }
    }
}
