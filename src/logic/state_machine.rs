use crate::config::SiteFlags;
use crate::logic::errors::FieldErrors;
use crate::model::constants::{
    valid_publish_status_transitions, valid_status_next_values, valid_status_transitions,
    ERROR_LAUNCHING_DISABLED, PUBLISH_STATUS_ALLOWS_UPDATE, STATUS_ALLOWS_UPDATE,
    STATUS_UPDATE_EXEMPT_FIELDS,
};
use crate::model::experiment::{Experiment, ExperimentUpdate, Status};

/// Status-gated field locking and transition-table checks for experiment
/// updates. All checks accumulate into `FieldErrors`; nothing here touches
/// the store.
pub struct StateMachine;

impl StateMachine {
    pub fn validate(
        experiment: &Experiment,
        update: &ExperimentUpdate,
        flags: &SiteFlags,
        errors: &mut FieldErrors,
    ) {
        let modified = update.provided_fields();
        Self::check_field_locks(experiment, &modified, errors);
        Self::check_status_transition(experiment, update, errors);
        Self::check_publish_status_transition(experiment, update, errors);
        Self::check_status_next(experiment, update, errors);
        Self::check_launching_disabled(experiment, update, flags, errors);
    }

    /// Two independent axes: while either the status or the publish status
    /// is outside its update-allowed set, reject any modified field that is
    /// not in the exempt list, naming the offenders.
    pub fn check_field_locks(
        experiment: &Experiment,
        modified_fields: &[&'static str],
        errors: &mut FieldErrors,
    ) {
        let locked_fields: Vec<&str> = modified_fields
            .iter()
            .copied()
            .filter(|f| !STATUS_UPDATE_EXEMPT_FIELDS.contains(f))
            .collect();
        if locked_fields.is_empty() {
            return;
        }

        if !STATUS_ALLOWS_UPDATE.contains(&experiment.status) {
            errors.add(
                "experiment",
                format!(
                    "Experiment has status '{}', only {:?} can be changed, not: {:?}",
                    experiment.status, STATUS_UPDATE_EXEMPT_FIELDS, locked_fields
                ),
            );
        }

        if !PUBLISH_STATUS_ALLOWS_UPDATE.contains(&experiment.publish_status) {
            errors.add(
                "experiment",
                format!(
                    "Experiment has publish status '{}', only {:?} can be changed, not: {:?}",
                    experiment.publish_status, STATUS_UPDATE_EXEMPT_FIELDS, locked_fields
                ),
            );
        }
    }

    pub fn check_status_transition(
        experiment: &Experiment,
        update: &ExperimentUpdate,
        errors: &mut FieldErrors,
    ) {
        if let Some(proposed) = update.status {
            if proposed != experiment.status
                && !valid_status_transitions(experiment.status).contains(&proposed)
            {
                errors.add(
                    "status",
                    format!(
                        "Experiment status cannot transition from {} to {}.",
                        experiment.status, proposed
                    ),
                );
            }
        }
    }

    pub fn check_publish_status_transition(
        experiment: &Experiment,
        update: &ExperimentUpdate,
        errors: &mut FieldErrors,
    ) {
        if let Some(proposed) = update.publish_status {
            if proposed != experiment.publish_status
                && !valid_publish_status_transitions(experiment.publish_status)
                    .contains(&proposed)
            {
                errors.add(
                    "publishStatus",
                    format!(
                        "Experiment publish status cannot transition from {} to {}.",
                        experiment.publish_status, proposed
                    ),
                );
            }
        }
    }

    /// `statusNext` proposals have their own valid-value table keyed by the
    /// current status.
    pub fn check_status_next(
        experiment: &Experiment,
        update: &ExperimentUpdate,
        errors: &mut FieldErrors,
    ) {
        // An explicit null clears the proposal and is always accepted.
        if let Some(Some(proposed)) = update.status_next {
            let valid = valid_status_next_values(experiment.status);
            if !valid.contains(&proposed) {
                let choices = valid
                    .iter()
                    .map(Status::label)
                    .collect::<Vec<_>>()
                    .join(", ");
                errors.add(
                    "statusNext",
                    format!(
                        "Invalid choice for statusNext: '{}' - with status '{}', \
                         the only valid choices are '{}'",
                        proposed, experiment.status, choices
                    ),
                );
            }
        }
    }

    /// Site-wide kill switch: blocks proposing Live from Draft regardless of
    /// the transition tables.
    pub fn check_launching_disabled(
        experiment: &Experiment,
        update: &ExperimentUpdate,
        flags: &SiteFlags,
        errors: &mut FieldErrors,
    ) {
        if flags.launching_disabled
            && experiment.status == Status::Draft
            && update.status_next == Some(Some(Status::Live))
        {
            errors.add("statusNext", ERROR_LAUNCHING_DISABLED);
        }
    }
}
