use serde::{Deserialize, Serialize};

use crate::model::common::{generate_id, slugify, Id};

/// Screenshot attached to a branch. The image itself lives in external
/// storage; only the path is tracked here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screenshot {
    pub id: Id,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// One feature payload per feature config per branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureValue {
    pub feature_config: Option<Id>,
    pub enabled: bool,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: Id,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub ratio: u32,
    pub feature_values: Vec<FeatureValue>,
    pub screenshots: Vec<Screenshot>,
}

impl Branch {
    /// Feature values in their canonical order (by feature config slug,
    /// values without a config first).
    pub fn feature_values_sorted(&self) -> Vec<&FeatureValue> {
        let mut values: Vec<&FeatureValue> = self.feature_values.iter().collect();
        values.sort_by(|a, b| a.feature_config.cmp(&b.feature_config));
        values
    }

    /// Copy for a cloned experiment: same content, fresh identifiers.
    pub fn duplicate(&self) -> Branch {
        Branch {
            id: generate_id(),
            name: self.name.clone(),
            slug: self.slug.clone(),
            description: self.description.clone(),
            ratio: self.ratio,
            feature_values: self.feature_values.clone(),
            screenshots: self
                .screenshots
                .iter()
                .map(|s| Screenshot {
                    id: generate_id(),
                    description: s.description.clone(),
                    image: s.image.clone(),
                })
                .collect(),
        }
    }
}

/// Input model for creating or updating a branch as part of an experiment
/// update. A present `id` updates the matching branch, an absent `id`
/// creates a new one; branches missing from the payload are deleted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BranchInput {
    pub id: Option<Id>,
    pub name: String,
    pub description: Option<String>,
    pub ratio: Option<u32>,
    /// Legacy single-feature pair; maps to the experiment's
    /// lexicographically-first feature config.
    pub feature_enabled: Option<bool>,
    pub feature_value: Option<String>,
    pub feature_values: Option<Vec<FeatureValueInput>>,
    pub screenshots: Option<Vec<ScreenshotInput>>,
}

impl BranchInput {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn slug(&self) -> String {
        slugify(&self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureValueInput {
    pub feature_config: Option<Id>,
    pub enabled: Option<bool>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScreenshotInput {
    pub id: Option<Id>,
    pub description: Option<String>,
    pub image: Option<String>,
}
