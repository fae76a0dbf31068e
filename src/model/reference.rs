use serde::{Deserialize, Serialize};

use crate::model::common::Id;
use crate::model::experiment::{Application, Channel, FirefoxVersion};

/// A named, schema-bearing configuration surface that branch feature values
/// are validated against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureConfig {
    pub slug: Id,
    pub name: String,
    pub description: String,
    pub application: Application,
    pub owner_email: String,
    /// JSON Schema document as a string; absence skips schema validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

/// A named targeting predicate with declared per-application support.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetingConfig {
    pub slug: Id,
    pub name: String,
    pub description: String,
    pub applications: Vec<Application>,
    pub sticky_required: bool,
    pub is_first_run_required: bool,
}

impl TargetingConfig {
    pub fn supports(&self, application: Application) -> bool {
        self.applications.contains(&application)
    }
}

/// Country, locale or language row from the geo reference tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geo {
    pub name: String,
    pub code: String,
}

impl Geo {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    pub slug: Id,
    pub friendly_name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub slug: Id,
    pub friendly_name: String,
    pub application: Application,
    pub description: String,
    pub is_default: bool,
    pub metrics: Vec<Metric>,
}

/// Per-application configuration: which channels exist (first is the
/// default at creation), which publish collection approved experiments are
/// pushed to, and the minimum versions gating targeting features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationConfig {
    pub application: Application,
    pub channels: Vec<Channel>,
    pub publish_collection: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub languages_supported_version: Option<FirefoxVersion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countries_supported_version: Option<FirefoxVersion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollout_supported_version: Option<FirefoxVersion>,
}

impl ApplicationConfig {
    pub fn default_channel(&self) -> Option<Channel> {
        self.channels.first().copied()
    }
}
