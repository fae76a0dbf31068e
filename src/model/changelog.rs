use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::common::{generate_id, Id};

/// Immutable audit record emitted once per successful save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLogEntry {
    pub id: Id,
    pub experiment_slug: Id,
    pub actor: String,
    pub message: String,
    pub changed_at: DateTime<Utc>,
}

impl ChangeLogEntry {
    pub fn new(experiment_slug: impl Into<Id>, actor: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            experiment_slug: experiment_slug.into(),
            actor: actor.into(),
            message: message.into(),
            changed_at: Utc::now(),
        }
    }
}

/// Outbound command for the background worker. The core enqueues these
/// fire-and-forget; delivery and retry live in the consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum TaskCommand {
    /// Re-sync preview-environment experiments after a Draft<->Preview flip.
    SyncPreviewExperiments,
    /// Check the pending-publish queue for one application's collection.
    CheckPushQueue { collection: String },
}
