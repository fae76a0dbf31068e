use anyhow::Result;
use std::time::Duration;

use crate::model::{
    Application, ApplicationConfig, ChangeLogEntry, Experiment, FeatureConfig, Geo, Outcome,
    TargetingConfig, TaskCommand,
};

#[async_trait::async_trait]
pub trait ExperimentStore: Send + Sync {
    async fn get_experiment(&self, slug: &str) -> Result<Option<Experiment>>;
    async fn list_experiments(&self) -> Result<Vec<Experiment>>;
    /// Atomic commit point: the whole aggregate (branches, feature values,
    /// screenshots, documentation links) replaces the stored one in a
    /// single call.
    async fn upsert_experiment(&self, experiment: Experiment) -> Result<()>;
    async fn delete_experiment(&self, slug: &str) -> Result<bool>;
    async fn slug_exists(&self, slug: &str) -> Result<bool>;
}

/// Read-only reference data: geo tables, feature configs, targeting
/// configs, outcomes, per-application configuration. Collections come back
/// in their canonical display order.
#[async_trait::async_trait]
pub trait ReferenceStore: Send + Sync {
    async fn application_config(
        &self,
        application: Application,
    ) -> Result<Option<ApplicationConfig>>;
    async fn list_application_configs(&self) -> Result<Vec<ApplicationConfig>>;
    async fn list_countries(&self) -> Result<Vec<Geo>>;
    async fn list_locales(&self) -> Result<Vec<Geo>>;
    async fn list_languages(&self) -> Result<Vec<Geo>>;
    async fn list_feature_configs(&self) -> Result<Vec<FeatureConfig>>;
    async fn get_feature_config(&self, slug: &str) -> Result<Option<FeatureConfig>>;
    async fn list_targeting_configs(&self) -> Result<Vec<TargetingConfig>>;
    async fn get_targeting_config(&self, slug: &str) -> Result<Option<TargetingConfig>>;
    async fn list_outcomes(&self) -> Result<Vec<Outcome>>;
}

#[async_trait::async_trait]
pub trait ChangeLogStore: Send + Sync {
    async fn record_change(&self, entry: ChangeLogEntry) -> Result<()>;
    async fn list_changes(&self, experiment_slug: &str) -> Result<Vec<ChangeLogEntry>>;
}

/// Outbound command queue for the background worker. Enqueues are
/// fire-and-forget; delivery and retry policy live in the consumer.
#[async_trait::async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, command: TaskCommand, delay: Duration) -> Result<()>;
}

pub trait Store:
    ExperimentStore + ReferenceStore + ChangeLogStore + TaskQueue + Send + Sync
{
}
