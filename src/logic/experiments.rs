use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::config::SiteFlags;
use crate::logic::branch_ops::BranchOperations;
use crate::logic::errors::{FieldErrors, OperationError};
use crate::logic::state_machine::StateMachine;
use crate::model::changelog::{ChangeLogEntry, TaskCommand};
use crate::model::common::slugify;
use crate::model::constants::{
    ARCHIVE_UPDATE_EXEMPT_FIELDS, ERROR_ENROLLMENT_EXCEEDS_DURATION, ERROR_HYPOTHESIS_DEFAULT,
    ERROR_NAME_INVALID, ERROR_NAME_REQUIRED, ERROR_PRIMARY_SECONDARY_OUTCOMES_OVERLAP,
    ERROR_SLUG_DUPLICATE, HYPOTHESIS_DEFAULT, MAX_PRIMARY_OUTCOMES,
};
use crate::model::experiment::{
    CloneInput, Experiment, ExperimentCreate, ExperimentUpdate, PublishStatus, Status,
};
use crate::store::traits::Store;

/// Per-request context: who is acting.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub actor: String,
}

impl RequestContext {
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
        }
    }
}

/// Background task enqueue delay.
const TASK_DELAY: Duration = Duration::from_secs(5);

/// Orchestrates validation and persistence of the experiment aggregate.
/// Validation is an explicit ordered pipeline of steps accumulating into
/// one `FieldErrors`; persistence applies the whole update to a cloned
/// draft and commits it with a single upsert.
pub struct ExperimentOperations;

impl ExperimentOperations {
    pub async fn create<S: Store>(
        store: &S,
        ctx: &RequestContext,
        input: ExperimentCreate,
    ) -> Result<Experiment, OperationError> {
        let mut errors = FieldErrors::default();

        if input.changelog_message.is_empty() {
            errors.add("changelogMessage", "This field is required.");
        }

        let slug = slugify(&input.name);
        if input.name.is_empty() {
            errors.add("name", ERROR_NAME_REQUIRED);
        } else if slug.is_empty() {
            errors.add("name", ERROR_NAME_INVALID);
        } else if store.slug_exists(&slug).await? {
            errors.add("name", ERROR_SLUG_DUPLICATE);
        }

        if let Some(hypothesis) = &input.hypothesis {
            if hypothesis.trim() == HYPOTHESIS_DEFAULT.trim() {
                errors.add("hypothesis", ERROR_HYPOTHESIS_DEFAULT);
            }
        }

        errors.into_result()?;

        // Channel defaults to the first channel configured for the
        // application.
        let channel = store
            .application_config(input.application)
            .await?
            .and_then(|config| config.default_channel())
            .unwrap_or(crate::model::experiment::Channel::NoChannel);

        let mut experiment =
            Experiment::new(input.name, ctx.actor.clone(), input.application, channel);
        if let Some(hypothesis) = input.hypothesis {
            experiment.hypothesis = hypothesis;
        }
        if let Some(description) = input.public_description {
            experiment.public_description = description;
        }

        store.upsert_experiment(experiment.clone()).await?;
        store
            .record_change(ChangeLogEntry::new(
                &experiment.slug,
                &ctx.actor,
                input.changelog_message,
            ))
            .await?;
        info!("created experiment '{}'", experiment.slug);

        Ok(experiment)
    }

    pub async fn update<S: Store>(
        store: &S,
        ctx: &RequestContext,
        slug: &str,
        update: ExperimentUpdate,
        flags: &SiteFlags,
    ) -> Result<Experiment, OperationError> {
        let experiment = store
            .get_experiment(slug)
            .await?
            .ok_or_else(|| OperationError::NotFound(format!("experiment '{slug}'")))?;

        let errors = Self::validate_update(store, ctx, &experiment, &update, flags).await?;
        if !errors.is_empty() {
            debug!("update of '{slug}' rejected: {errors:?}");
            return Err(OperationError::Validation(errors));
        }

        let old_status = experiment.status;
        let old_publish_status = experiment.publish_status;
        let draft = Self::apply_update(store, ctx, experiment, &update).await?;

        store.upsert_experiment(draft.clone()).await?;
        store
            .record_change(ChangeLogEntry::new(
                &draft.slug,
                &ctx.actor,
                update.changelog_message.clone(),
            ))
            .await?;
        info!("saved experiment '{}'", draft.slug);

        Self::dispatch_triggers(store, &draft, old_status, old_publish_status).await?;

        Ok(draft)
    }

    /// The ordered validation pipeline. Steps accumulate; a minority of
    /// lookups (unknown slugs) fail per-field as they are discovered.
    async fn validate_update<S: Store>(
        store: &S,
        ctx: &RequestContext,
        experiment: &Experiment,
        update: &ExperimentUpdate,
        flags: &SiteFlags,
    ) -> Result<FieldErrors, OperationError> {
        let mut errors = FieldErrors::default();

        if update.changelog_message.is_empty() {
            errors.add("changelogMessage", "This field is required.");
        }

        if let Some(name) = &update.name {
            if slugify(name).is_empty() {
                errors.add("name", ERROR_NAME_INVALID);
            }
        }

        StateMachine::validate(experiment, update, flags, &mut errors);
        Self::check_archive_lock(experiment, update, &mut errors);
        Self::check_is_archived(experiment, update, &mut errors);
        Self::check_reviewer(ctx, experiment, update, &mut errors);

        if let Some(hypothesis) = &update.hypothesis {
            if hypothesis.trim() == HYPOTHESIS_DEFAULT.trim() {
                errors.add("hypothesis", ERROR_HYPOTHESIS_DEFAULT);
            }
        }

        if let Some(percent) = update.population_percent {
            if !(0.0..=100.0).contains(&percent) {
                errors.add(
                    "populationPercent",
                    "Ensure this value is between 0 and 100.",
                );
            }
        }

        Self::check_outcomes(store, experiment, update, &mut errors).await?;
        Self::check_targeting_config(store, experiment, update, &mut errors).await?;
        Self::check_feature_configs(store, update, &mut errors).await?;
        Self::check_geo_choices(store, update, &mut errors).await?;

        if let (Some(enrollment), Some(duration)) =
            (update.proposed_enrollment, update.proposed_duration)
        {
            if enrollment > duration {
                errors.add("proposedEnrollment", ERROR_ENROLLMENT_EXCEEDS_DURATION);
            }
        }

        BranchOperations::validate_branch_set(update, &mut errors);

        Ok(errors)
    }

    /// Archived experiments accept only the archive-exempt fields.
    fn check_archive_lock(
        experiment: &Experiment,
        update: &ExperimentUpdate,
        errors: &mut FieldErrors,
    ) {
        if !experiment.is_archived {
            return;
        }
        for field in update.provided_fields() {
            if !ARCHIVE_UPDATE_EXEMPT_FIELDS.contains(&field) {
                errors.add(
                    field,
                    format!("{field} can't be updated while an experiment is archived"),
                );
            }
        }
    }

    /// Archiving itself is only valid from Draft/Complete with an Idle
    /// publish status.
    fn check_is_archived(
        experiment: &Experiment,
        update: &ExperimentUpdate,
        errors: &mut FieldErrors,
    ) {
        if update.is_archived.is_none() {
            return;
        }
        if !matches!(experiment.status, Status::Draft | Status::Complete) {
            errors.add(
                "isArchived",
                format!(
                    "An experiment in status {} can not be archived",
                    experiment.status
                ),
            );
        }
        if experiment.publish_status != PublishStatus::Idle {
            errors.add(
                "isArchived",
                format!(
                    "An experiment in publish status {} can not be archived",
                    experiment.publish_status
                ),
            );
        }
    }

    /// The actor who asked for review cannot approve their own request.
    fn check_reviewer(
        ctx: &RequestContext,
        experiment: &Experiment,
        update: &ExperimentUpdate,
        errors: &mut FieldErrors,
    ) {
        if update.publish_status == Some(PublishStatus::Approved)
            && experiment.publish_status != PublishStatus::Idle
            && experiment.review_requested_by.as_deref() == Some(ctx.actor.as_str())
        {
            errors.add(
                "publishStatus",
                format!("{} can not review this experiment.", ctx.actor),
            );
        }
    }

    async fn check_outcomes<S: Store>(
        store: &S,
        experiment: &Experiment,
        update: &ExperimentUpdate,
        errors: &mut FieldErrors,
    ) -> Result<(), OperationError> {
        let valid: BTreeSet<String> = store
            .list_outcomes()
            .await?
            .into_iter()
            .filter(|o| o.application == experiment.application)
            .map(|o| o.slug)
            .collect();

        if let Some(primary) = &update.primary_outcomes {
            if primary.len() > MAX_PRIMARY_OUTCOMES {
                errors.add(
                    "primaryOutcomes",
                    format!("Exceeded maximum primary outcome limit of {MAX_PRIMARY_OUTCOMES}."),
                );
            }
            let invalid: Vec<&String> = primary.iter().filter(|o| !valid.contains(*o)).collect();
            if !invalid.is_empty() {
                errors.add(
                    "primaryOutcomes",
                    format!("Invalid choices for primary outcomes: {invalid:?}"),
                );
            }
        }

        if let Some(secondary) = &update.secondary_outcomes {
            let invalid: Vec<&String> = secondary.iter().filter(|o| !valid.contains(*o)).collect();
            if !invalid.is_empty() {
                errors.add(
                    "secondaryOutcomes",
                    format!("Invalid choices for secondary outcomes: {invalid:?}"),
                );
            }
        }

        if let (Some(primary), Some(secondary)) =
            (&update.primary_outcomes, &update.secondary_outcomes)
        {
            let primary: BTreeSet<&String> = primary.iter().collect();
            if secondary.iter().any(|o| primary.contains(o)) {
                errors.add("primaryOutcomes", ERROR_PRIMARY_SECONDARY_OUTCOMES_OVERLAP);
            }
        }

        Ok(())
    }

    async fn check_targeting_config<S: Store>(
        store: &S,
        experiment: &Experiment,
        update: &ExperimentUpdate,
        errors: &mut FieldErrors,
    ) -> Result<(), OperationError> {
        let Some(slug) = &update.targeting_config_slug else {
            return Ok(());
        };
        match store.get_targeting_config(slug).await? {
            None => {
                errors.add(
                    "targetingConfigSlug",
                    format!("Targeting config '{slug}' does not exist"),
                );
            }
            Some(config) if !config.supports(experiment.application) => {
                errors.add(
                    "targetingConfigSlug",
                    format!(
                        "Targeting config '{}' is not available for application '{}'",
                        config.name,
                        experiment.application.label()
                    ),
                );
            }
            Some(_) => {}
        }
        Ok(())
    }

    async fn check_feature_configs<S: Store>(
        store: &S,
        update: &ExperimentUpdate,
        errors: &mut FieldErrors,
    ) -> Result<(), OperationError> {
        if let Some(slug) = &update.feature_config {
            if store.get_feature_config(slug).await?.is_none() {
                errors.add(
                    "featureConfig",
                    format!("Feature config '{slug}' does not exist"),
                );
            }
        }
        if let Some(slugs) = &update.feature_configs {
            for slug in slugs {
                if store.get_feature_config(slug).await?.is_none() {
                    errors.add(
                        "featureConfigs",
                        format!("Feature config '{slug}' does not exist"),
                    );
                }
            }
        }
        Ok(())
    }

    async fn check_geo_choices<S: Store>(
        store: &S,
        update: &ExperimentUpdate,
        errors: &mut FieldErrors,
    ) -> Result<(), OperationError> {
        let checks: [(&str, &Option<Vec<String>>, Vec<crate::model::Geo>); 3] = [
            ("countries", &update.countries, store.list_countries().await?),
            ("locales", &update.locales, store.list_locales().await?),
            ("languages", &update.languages, store.list_languages().await?),
        ];
        for (field, provided, known) in checks {
            let Some(codes) = provided else { continue };
            let known: BTreeSet<&str> = known.iter().map(|g| g.code.as_str()).collect();
            let invalid: Vec<&String> =
                codes.iter().filter(|c| !known.contains(c.as_str())).collect();
            if !invalid.is_empty() {
                errors.add(field, format!("Invalid choices for {field}: {invalid:?}"));
            }
        }
        Ok(())
    }

    /// Apply the validated update to a cloned draft. The feature-config
    /// association is swapped before branches materialize because branch
    /// feature values resolve their default config from it.
    async fn apply_update<S: Store>(
        store: &S,
        ctx: &RequestContext,
        experiment: Experiment,
        update: &ExperimentUpdate,
    ) -> Result<Experiment, OperationError> {
        let mut draft = experiment;

        if let Some(name) = &update.name {
            draft.name = name.clone();
        }
        if let Some(channel) = update.channel {
            draft.channel = channel;
        }
        if let Some(description) = &update.public_description {
            draft.public_description = description.clone();
        }
        if let Some(hypothesis) = &update.hypothesis {
            draft.hypothesis = hypothesis.clone();
        }
        if let Some(link) = &update.risk_mitigation_link {
            draft.risk_mitigation_link = link.clone();
        }
        if let Some(warn) = update.warn_feature_schema {
            draft.warn_feature_schema = warn;
        }
        if let Some(slug) = &update.targeting_config_slug {
            draft.targeting_config_slug = Some(slug.clone());
        }
        if let Some(percent) = update.population_percent {
            // Four decimal places, like the original fixed-point column.
            draft.population_percent = (percent * 10_000.0).round() / 10_000.0;
        }
        if let Some(clients) = update.total_enrolled_clients {
            draft.total_enrolled_clients = Some(clients);
        }
        if let Some(enrollment) = update.proposed_enrollment {
            draft.proposed_enrollment = Some(enrollment);
        }
        if let Some(duration) = update.proposed_duration {
            draft.proposed_duration = Some(duration);
        }
        if let Some(version) = update.firefox_min_version {
            draft.firefox_min_version = Some(version);
        }
        if let Some(version) = update.firefox_max_version {
            draft.firefox_max_version = Some(version);
        }
        if let Some(outcomes) = &update.primary_outcomes {
            draft.primary_outcomes = outcomes.clone();
        }
        if let Some(outcomes) = &update.secondary_outcomes {
            draft.secondary_outcomes = outcomes.clone();
        }
        if let Some(codes) = &update.countries {
            draft.countries = codes.clone();
        }
        if let Some(codes) = &update.locales {
            draft.locales = codes.clone();
        }
        if let Some(codes) = &update.languages {
            draft.languages = codes.clone();
        }
        if let Some(archived) = update.is_archived {
            draft.is_archived = archived;
        }
        if let Some(rollout) = update.is_rollout {
            draft.is_rollout = rollout;
        }
        if let Some(sticky) = update.is_sticky {
            draft.is_sticky = sticky;
        }
        if let Some(first_run) = update.is_first_run {
            draft.is_first_run = first_run;
        }
        if let Some(paused) = update.is_paused {
            draft.is_paused = paused;
        }
        if update.risk_brand.is_some() {
            draft.risk_brand = update.risk_brand;
        }
        if update.risk_partner_related.is_some() {
            draft.risk_partner_related = update.risk_partner_related;
        }
        if update.risk_revenue.is_some() {
            draft.risk_revenue = update.risk_revenue;
        }
        if let Some(summary) = &update.takeaways_summary {
            draft.takeaways_summary = Some(summary.clone());
        }
        if update.conclusion_recommendation.is_some() {
            draft.conclusion_recommendation = update.conclusion_recommendation;
        }
        if let Some(status) = update.status {
            draft.status = status;
        }
        if let Some(status_next) = update.status_next {
            draft.status_next = status_next;
        }
        if let Some(publish_status) = update.publish_status {
            if publish_status == PublishStatus::Review
                && draft.publish_status != PublishStatus::Review
            {
                draft.review_requested_by = Some(ctx.actor.clone());
            }
            if publish_status == PublishStatus::Idle {
                draft.review_requested_by = None;
            }
            draft.publish_status = publish_status;
        }

        // Replace (never merge) the feature-config association first.
        if let Some(slug) = &update.feature_config {
            draft.feature_configs = vec![slug.clone()];
        }
        if let Some(slugs) = &update.feature_configs {
            draft.feature_configs = slugs.clone();
        }
        draft.feature_configs.sort();
        draft.feature_configs.dedup();

        if let Some(links) = &update.documentation_links {
            // Delete-all-then-recreate semantics.
            draft.documentation_links = links.clone();
        }

        if update.reference_branch.is_some() || update.treatment_branches.is_some() {
            Self::apply_branches(store, &mut draft, update).await?;
        }

        if draft.should_allocate_buckets() {
            draft.allocate_bucket_range();
        }
        draft.updated_at = chrono::Utc::now();

        Ok(draft)
    }

    /// Reconcile the branch set: incoming ids update their branch, ids on
    /// the experiment but absent from the payload are deleted, id-less
    /// entries are created. One atomic unit with the rest of the save.
    async fn apply_branches<S: Store>(
        store: &S,
        draft: &mut Experiment,
        update: &ExperimentUpdate,
    ) -> Result<(), OperationError> {
        let application = draft.application;
        let existing: Vec<crate::model::Branch> = draft.branches().cloned().collect();
        let find_existing = |id: &Option<String>| -> Option<&crate::model::Branch> {
            id.as_ref()
                .and_then(|id| existing.iter().find(|b| &b.id == id))
        };

        // Branch feature values default to the lexicographically-first
        // associated feature config; validated to exist, but tolerate an
        // empty association.
        let default_config = draft.feature_configs.first().cloned();
        let default_config = match &default_config {
            Some(slug) => store.get_feature_config(slug).await?.map(|f| f.slug),
            None => None,
        };

        draft.reference_branch = update.reference_branch.as_ref().map(|input| {
            BranchOperations::materialize(
                find_existing(&input.id),
                input,
                default_config.as_ref(),
                application,
            )
        });

        draft.treatment_branches = update
            .treatment_branches
            .as_ref()
            .map(|inputs| {
                inputs
                    .iter()
                    .map(|input| {
                        BranchOperations::materialize(
                            find_existing(&input.id),
                            input,
                            default_config.as_ref(),
                            application,
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(())
    }

    /// Fire-and-forget side effects, enqueued with a short delay and never
    /// awaited for completion.
    async fn dispatch_triggers<S: Store>(
        store: &S,
        saved: &Experiment,
        old_status: Status,
        old_publish_status: PublishStatus,
    ) -> Result<(), OperationError> {
        let preview_flip = (old_status == Status::Draft && saved.status == Status::Preview)
            || (old_status == Status::Preview && saved.status == Status::Draft);
        if preview_flip {
            info!("enqueueing preview sync for '{}'", saved.slug);
            store
                .enqueue(TaskCommand::SyncPreviewExperiments, TASK_DELAY)
                .await?;
        }

        if saved.publish_status == PublishStatus::Approved
            && old_publish_status != PublishStatus::Approved
        {
            match store.application_config(saved.application).await? {
                Some(config) => {
                    info!(
                        "enqueueing publish-queue check for '{}' on '{}'",
                        saved.slug, config.publish_collection
                    );
                    store
                        .enqueue(
                            TaskCommand::CheckPushQueue {
                                collection: config.publish_collection,
                            },
                            TASK_DELAY,
                        )
                        .await?;
                }
                None => warn!(
                    "no application config for {:?}; publish-queue check skipped",
                    saved.application
                ),
            }
        }

        Ok(())
    }

    /// Derive a new experiment from an existing one, optionally narrowed to
    /// a single rollout branch.
    pub async fn clone_experiment<S: Store>(
        store: &S,
        ctx: &RequestContext,
        input: CloneInput,
    ) -> Result<Experiment, OperationError> {
        let parent = store
            .get_experiment(&input.parent_slug)
            .await?
            .ok_or_else(|| {
                OperationError::NotFound(format!("experiment '{}'", input.parent_slug))
            })?;

        let mut errors = FieldErrors::default();
        let slug = slugify(&input.name);
        if input.name.is_empty() {
            errors.add("name", ERROR_NAME_REQUIRED);
        } else if slug.is_empty() {
            errors.add("name", ERROR_NAME_INVALID);
        } else if store.slug_exists(&slug).await? {
            errors.add("name", ERROR_SLUG_DUPLICATE);
        }

        if let Some(branch_slug) = &input.rollout_branch_slug {
            if parent.branch_by_slug(branch_slug).is_none() {
                errors.add(
                    "rolloutBranchSlug",
                    format!("Rollout branch {branch_slug} does not exist."),
                );
            }
        }
        errors.into_result()?;

        let cloned = parent.clone_as(
            &input.name,
            &ctx.actor,
            input.rollout_branch_slug.as_deref(),
        );
        store.upsert_experiment(cloned.clone()).await?;
        store
            .record_change(ChangeLogEntry::new(
                &cloned.slug,
                &ctx.actor,
                format!("Cloned from {}", parent.name),
            ))
            .await?;
        info!("cloned '{}' as '{}'", parent.slug, cloned.slug);

        Ok(cloned)
    }
}
