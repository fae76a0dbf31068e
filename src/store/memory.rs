use anyhow::Result;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::model::{
    Application, ApplicationConfig, ChangeLogEntry, Experiment, FeatureConfig, Geo, Id, Outcome,
    TargetingConfig, TaskCommand,
};
use crate::store::traits::{ChangeLogStore, ExperimentStore, ReferenceStore, Store, TaskQueue};

/// Reference-data snapshot held by the in-memory store.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub application_configs: Vec<ApplicationConfig>,
    pub countries: Vec<Geo>,
    pub locales: Vec<Geo>,
    pub languages: Vec<Geo>,
    pub feature_configs: Vec<FeatureConfig>,
    pub targeting_configs: Vec<TargetingConfig>,
    pub outcomes: Vec<Outcome>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedTask {
    pub command: TaskCommand,
    pub delay: Duration,
}

/// In-memory store for tests and embedders. `upsert_experiment` swaps the
/// whole aggregate under one write lock, which is what makes each save
/// all-or-nothing.
#[derive(Default)]
pub struct InMemoryStore {
    experiments: RwLock<BTreeMap<Id, Experiment>>,
    reference: RwLock<ReferenceData>,
    changes: RwLock<Vec<ChangeLogEntry>>,
    tasks: RwLock<Vec<QueuedTask>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reference_data(reference: ReferenceData) -> Self {
        Self {
            reference: RwLock::new(reference),
            ..Self::default()
        }
    }

    pub fn set_reference_data(&self, reference: ReferenceData) {
        *self.reference.write() = reference;
    }

    /// Commands enqueued so far, oldest first. Test observability hook.
    pub fn queued_tasks(&self) -> Vec<QueuedTask> {
        self.tasks.read().clone()
    }
}

#[async_trait::async_trait]
impl ExperimentStore for InMemoryStore {
    async fn get_experiment(&self, slug: &str) -> Result<Option<Experiment>> {
        Ok(self.experiments.read().get(slug).cloned())
    }

    async fn list_experiments(&self) -> Result<Vec<Experiment>> {
        Ok(self.experiments.read().values().cloned().collect())
    }

    async fn upsert_experiment(&self, experiment: Experiment) -> Result<()> {
        self.experiments
            .write()
            .insert(experiment.slug.clone(), experiment);
        Ok(())
    }

    async fn delete_experiment(&self, slug: &str) -> Result<bool> {
        Ok(self.experiments.write().remove(slug).is_some())
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        Ok(self.experiments.read().contains_key(slug))
    }
}

#[async_trait::async_trait]
impl ReferenceStore for InMemoryStore {
    async fn application_config(
        &self,
        application: Application,
    ) -> Result<Option<ApplicationConfig>> {
        Ok(self
            .reference
            .read()
            .application_configs
            .iter()
            .find(|c| c.application == application)
            .cloned())
    }

    async fn list_application_configs(&self) -> Result<Vec<ApplicationConfig>> {
        Ok(self.reference.read().application_configs.clone())
    }

    async fn list_countries(&self) -> Result<Vec<Geo>> {
        Ok(sorted_by_name(&self.reference.read().countries))
    }

    async fn list_locales(&self) -> Result<Vec<Geo>> {
        Ok(sorted_by_name(&self.reference.read().locales))
    }

    async fn list_languages(&self) -> Result<Vec<Geo>> {
        Ok(sorted_by_name(&self.reference.read().languages))
    }

    async fn list_feature_configs(&self) -> Result<Vec<FeatureConfig>> {
        let mut configs = self.reference.read().feature_configs.clone();
        configs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(configs)
    }

    async fn get_feature_config(&self, slug: &str) -> Result<Option<FeatureConfig>> {
        Ok(self
            .reference
            .read()
            .feature_configs
            .iter()
            .find(|f| f.slug == slug)
            .cloned())
    }

    async fn list_targeting_configs(&self) -> Result<Vec<TargetingConfig>> {
        Ok(self.reference.read().targeting_configs.clone())
    }

    async fn get_targeting_config(&self, slug: &str) -> Result<Option<TargetingConfig>> {
        Ok(self
            .reference
            .read()
            .targeting_configs
            .iter()
            .find(|t| t.slug == slug)
            .cloned())
    }

    async fn list_outcomes(&self) -> Result<Vec<Outcome>> {
        Ok(self.reference.read().outcomes.clone())
    }
}

#[async_trait::async_trait]
impl ChangeLogStore for InMemoryStore {
    async fn record_change(&self, entry: ChangeLogEntry) -> Result<()> {
        self.changes.write().push(entry);
        Ok(())
    }

    async fn list_changes(&self, experiment_slug: &str) -> Result<Vec<ChangeLogEntry>> {
        Ok(self
            .changes
            .read()
            .iter()
            .filter(|e| e.experiment_slug == experiment_slug)
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl TaskQueue for InMemoryStore {
    async fn enqueue(&self, command: TaskCommand, delay: Duration) -> Result<()> {
        self.tasks.write().push(QueuedTask { command, delay });
        Ok(())
    }
}

impl Store for InMemoryStore {}

fn sorted_by_name(rows: &[Geo]) -> Vec<Geo> {
    let mut rows = rows.to_vec();
    rows.sort_by(|a, b| a.name.cmp(&b.name));
    rows
}
