use experiment_engine::model::branch::{BranchInput, FeatureValueInput};
use experiment_engine::model::changelog::TaskCommand;
use experiment_engine::model::constants::{
    ERROR_DUPLICATE_BRANCH_NAME, ERROR_ENROLLMENT_EXCEEDS_DURATION, ERROR_LAUNCHING_DISABLED,
    ERROR_SLUG_DUPLICATE,
};
use experiment_engine::model::experiment::{
    Application, Channel, CloneInput, DocumentationLink, DocumentationLinkKind, ExperimentCreate,
    ExperimentUpdate, PublishStatus, Status,
};
use experiment_engine::store::traits::{ChangeLogStore, ExperimentStore};
use experiment_engine::{
    seed, ExperimentOperations, InMemoryStore, OperationError, RequestContext, SiteFlags,
};

fn store() -> InMemoryStore {
    InMemoryStore::with_reference_data(seed::default_reference_data())
}

fn ctx() -> RequestContext {
    RequestContext::new("owner@example.com")
}

fn change(message: &str) -> ExperimentUpdate {
    ExperimentUpdate {
        changelog_message: message.into(),
        ..ExperimentUpdate::default()
    }
}

async fn create_draft(store: &InMemoryStore, name: &str) -> experiment_engine::Experiment {
    ExperimentOperations::create(
        store,
        &ctx(),
        ExperimentCreate {
            name: name.into(),
            application: Application::Desktop,
            hypothesis: None,
            public_description: None,
            changelog_message: "created".into(),
        },
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn create_slugifies_name_and_defaults_channel() {
    let store = store();
    let experiment = create_draft(&store, "My Test").await;

    assert_eq!(experiment.slug, "my-test");
    assert_eq!(experiment.status, Status::Draft);
    assert_eq!(experiment.publish_status, PublishStatus::Idle);
    // First configured Desktop channel.
    assert_eq!(experiment.channel, Channel::NoChannel);

    let changes = store.list_changes("my-test").await.unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].actor, "owner@example.com");
}

#[tokio::test]
async fn create_rejects_duplicate_slug() {
    let store = store();
    create_draft(&store, "My Test").await;

    let err = ExperimentOperations::create(
        &store,
        &ctx(),
        ExperimentCreate {
            name: "MY TEST".into(),
            application: Application::Desktop,
            hypothesis: None,
            public_description: None,
            changelog_message: "created again".into(),
        },
    )
    .await
    .unwrap_err();

    let errors = err.validation_errors().unwrap();
    assert_eq!(errors.messages_for("name"), &[ERROR_SLUG_DUPLICATE.to_string()]);
}

#[tokio::test]
async fn update_unknown_slug_is_not_found() {
    let store = store();
    let err = ExperimentOperations::update(
        &store,
        &ctx(),
        "missing",
        change("noop"),
        &SiteFlags::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, OperationError::NotFound(_)));
}

#[tokio::test]
async fn branch_payload_round_trips_and_reconciles_by_id() {
    let store = store();
    create_draft(&store, "Branchy").await;

    let mut update = change("add branches");
    update.feature_configs = Some(vec!["no-feature-desktop".into()]);
    update.reference_branch = Some(BranchInput {
        description: Some("control branch".into()),
        ratio: Some(1),
        feature_values: Some(vec![FeatureValueInput {
            feature_config: Some("no-feature-desktop".into()),
            enabled: Some(true),
            value: Some("{}".into()),
        }]),
        ..BranchInput::named("Control")
    });
    update.treatment_branches = Some(vec![BranchInput {
        description: Some("treatment branch".into()),
        ratio: Some(1),
        ..BranchInput::named("Variant A")
    }]);

    let saved = ExperimentOperations::update(&store, &ctx(), "branchy", update, &SiteFlags::default())
        .await
        .unwrap();
    let reference = saved.reference_branch.clone().unwrap();
    assert_eq!(reference.slug, "control");
    assert_eq!(saved.treatment_branches.len(), 1);
    assert_eq!(saved.treatment_branches[0].slug, "variant-a");

    // Resubmitting the reference by id keeps it; omitting the treatment
    // deletes it.
    let mut update = change("trim branches");
    update.reference_branch = Some(BranchInput {
        id: Some(reference.id.clone()),
        description: Some("still the control".into()),
        ..BranchInput::named("Control")
    });
    let saved = ExperimentOperations::update(&store, &ctx(), "branchy", update, &SiteFlags::default())
        .await
        .unwrap();
    assert_eq!(saved.reference_branch.as_ref().unwrap().id, reference.id);
    assert_eq!(
        saved.reference_branch.as_ref().unwrap().description,
        "still the control"
    );
    assert!(saved.treatment_branches.is_empty());

    let changes = store.list_changes("branchy").await.unwrap();
    assert_eq!(changes.len(), 3);
}

#[tokio::test]
async fn duplicate_branch_names_are_rejected() {
    let store = store();
    create_draft(&store, "Dups").await;

    let mut update = change("dup names");
    update.reference_branch = Some(BranchInput::named("Control"));
    update.treatment_branches = Some(vec![BranchInput::named("Control")]);

    let err = ExperimentOperations::update(&store, &ctx(), "dups", update, &SiteFlags::default())
        .await
        .unwrap_err();
    let errors = err.validation_errors().unwrap();
    assert_eq!(
        errors.reference_branch.0["name"],
        vec![ERROR_DUPLICATE_BRANCH_NAME.to_string()]
    );
    assert_eq!(
        errors.treatment_branches[0].0["name"],
        vec![ERROR_DUPLICATE_BRANCH_NAME.to_string()]
    );
}

#[tokio::test]
async fn enrollment_cannot_exceed_duration() {
    let store = store();
    create_draft(&store, "Timing").await;

    let mut update = change("bad timing");
    update.proposed_enrollment = Some(30);
    update.proposed_duration = Some(7);
    let err = ExperimentOperations::update(&store, &ctx(), "timing", update, &SiteFlags::default())
        .await
        .unwrap_err();
    assert_eq!(
        err.validation_errors().unwrap().messages_for("proposedEnrollment"),
        &[ERROR_ENROLLMENT_EXCEEDS_DURATION.to_string()]
    );
}

#[tokio::test]
async fn archived_experiment_accepts_only_exempt_fields() {
    let store = store();
    create_draft(&store, "Frozen").await;

    let mut archive = change("archive it");
    archive.is_archived = Some(true);
    ExperimentOperations::update(&store, &ctx(), "frozen", archive, &SiteFlags::default())
        .await
        .unwrap();

    let mut update = change("rename attempt");
    update.name = Some("New Name".into());
    let err = ExperimentOperations::update(&store, &ctx(), "frozen", update, &SiteFlags::default())
        .await
        .unwrap_err();
    assert!(err.validation_errors().unwrap().messages_for("name")[0]
        .contains("can't be updated while an experiment is archived"));

    // Unarchiving is itself exempt.
    let mut unarchive = change("unarchive");
    unarchive.is_archived = Some(false);
    let saved =
        ExperimentOperations::update(&store, &ctx(), "frozen", unarchive, &SiteFlags::default())
            .await
            .unwrap();
    assert!(!saved.is_archived);
}

#[tokio::test]
async fn documentation_links_replace_wholesale() {
    let store = store();
    create_draft(&store, "Docs").await;

    let links = vec![
        DocumentationLink {
            title: DocumentationLinkKind::DesignDoc,
            link: "https://example.com/design".into(),
        },
        DocumentationLink {
            title: DocumentationLinkKind::EngTicket,
            link: "https://example.com/ticket".into(),
        },
    ];

    let mut update = change("set links");
    update.documentation_links = Some(links.clone());
    let saved = ExperimentOperations::update(&store, &ctx(), "docs", update, &SiteFlags::default())
        .await
        .unwrap();
    assert_eq!(saved.documentation_links, links);

    // Resubmitting the same payload is idempotent.
    let mut update = change("set links again");
    update.documentation_links = Some(links.clone());
    let saved = ExperimentOperations::update(&store, &ctx(), "docs", update, &SiteFlags::default())
        .await
        .unwrap();
    assert_eq!(saved.documentation_links, links);
}

#[tokio::test]
async fn preview_transition_enqueues_sync_and_allocates_buckets() {
    let store = store();
    create_draft(&store, "Previewable").await;

    let mut update = change("set population");
    update.population_percent = Some(25.0);
    ExperimentOperations::update(&store, &ctx(), "previewable", update, &SiteFlags::default())
        .await
        .unwrap();
    assert!(store.queued_tasks().is_empty());

    let mut to_preview = change("to preview");
    to_preview.status = Some(Status::Preview);
    let saved =
        ExperimentOperations::update(&store, &ctx(), "previewable", to_preview, &SiteFlags::default())
            .await
            .unwrap();

    assert_eq!(saved.status, Status::Preview);
    let range = saved.bucket_range.unwrap();
    assert_eq!(range.count, 2_500);

    let tasks = store.queued_tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].command, TaskCommand::SyncPreviewExperiments);

    // Going back to Draft fires the sync again.
    let mut back = change("back to draft");
    back.status = Some(Status::Draft);
    ExperimentOperations::update(&store, &ctx(), "previewable", back, &SiteFlags::default())
        .await
        .unwrap();
    assert_eq!(store.queued_tasks().len(), 2);
}

#[tokio::test]
async fn launching_disabled_blocks_live_proposal() {
    let store = store();
    create_draft(&store, "Blocked").await;

    let mut update = change("try to launch");
    update.status_next = Some(Some(Status::Live));
    let flags = SiteFlags {
        launching_disabled: true,
    };
    let err = ExperimentOperations::update(&store, &ctx(), "blocked", update, &flags)
        .await
        .unwrap_err();
    assert_eq!(
        err.validation_errors().unwrap().messages_for("statusNext"),
        &[ERROR_LAUNCHING_DISABLED.to_string()]
    );
}

#[tokio::test]
async fn explicit_null_clears_a_live_proposal() {
    let store = store();
    create_draft(&store, "Clearable").await;

    let mut propose = change("propose launch");
    propose.status_next = Some(Some(Status::Live));
    let saved =
        ExperimentOperations::update(&store, &ctx(), "clearable", propose, &SiteFlags::default())
            .await
            .unwrap();
    assert_eq!(saved.status_next, Some(Status::Live));

    // A present-but-null statusNext cancels the proposal; an absent field
    // leaves it untouched.
    let cleared: ExperimentUpdate =
        serde_json::from_str(r#"{"statusNext": null, "changelogMessage": "cancel launch"}"#)
            .unwrap();
    assert_eq!(cleared.status_next, Some(None));
    let saved =
        ExperimentOperations::update(&store, &ctx(), "clearable", cleared, &SiteFlags::default())
            .await
            .unwrap();
    assert_eq!(saved.status_next, None);

    let untouched: ExperimentUpdate =
        serde_json::from_str(r#"{"changelogMessage": "noop"}"#).unwrap();
    assert_eq!(untouched.status_next, None);
}

#[tokio::test]
async fn review_workflow_blocks_self_approval_and_pushes_on_approve() {
    let store = store();
    create_draft(&store, "Workflow").await;

    let requester = RequestContext::new("requester@example.com");
    let mut to_review = change("request review");
    to_review.publish_status = Some(PublishStatus::Review);
    to_review.status_next = Some(Some(Status::Live));
    let saved =
        ExperimentOperations::update(&store, &requester, "workflow", to_review, &SiteFlags::default())
            .await
            .unwrap();
    assert_eq!(saved.publish_status, PublishStatus::Review);
    assert_eq!(
        saved.review_requested_by.as_deref(),
        Some("requester@example.com")
    );

    // The requester cannot approve their own request.
    let mut approve = change("approve");
    approve.publish_status = Some(PublishStatus::Approved);
    let err = ExperimentOperations::update(
        &store,
        &requester,
        "workflow",
        approve.clone(),
        &SiteFlags::default(),
    )
    .await
    .unwrap_err();
    assert!(err.validation_errors().unwrap().messages_for("publishStatus")[0]
        .contains("can not review this experiment"));

    // A different actor can, which enqueues the push-queue check for the
    // application's collection.
    let reviewer = RequestContext::new("reviewer@example.com");
    let saved =
        ExperimentOperations::update(&store, &reviewer, "workflow", approve, &SiteFlags::default())
            .await
            .unwrap();
    assert_eq!(saved.publish_status, PublishStatus::Approved);

    let tasks = store.queued_tasks();
    assert!(tasks.iter().any(|t| t.command
        == TaskCommand::CheckPushQueue {
            collection: "nimbus-desktop-experiments".into()
        }));
}

#[tokio::test]
async fn locked_experiment_rejects_ordinary_edits() {
    let store = store();
    let mut experiment = create_draft(&store, "Locked").await;
    experiment.status = Status::Live;
    store.upsert_experiment(experiment).await.unwrap();

    let mut update = change("late edit");
    update.hypothesis = Some("too late".into());
    let err = ExperimentOperations::update(&store, &ctx(), "locked", update, &SiteFlags::default())
        .await
        .unwrap_err();
    assert!(!err.validation_errors().unwrap().messages_for("experiment").is_empty());

    // Takeaways remain writable on a locked experiment.
    let mut takeaways = change("record takeaways");
    takeaways.takeaways_summary = Some("It shipped".into());
    let saved =
        ExperimentOperations::update(&store, &ctx(), "locked", takeaways, &SiteFlags::default())
            .await
            .unwrap();
    assert_eq!(saved.takeaways_summary.as_deref(), Some("It shipped"));
}

#[tokio::test]
async fn clone_copies_branches_with_fresh_identifiers() {
    let store = store();
    create_draft(&store, "Parent").await;

    let mut update = change("add branches");
    update.feature_configs = Some(vec!["no-feature-desktop".into()]);
    update.reference_branch = Some(BranchInput::named("Control"));
    update.treatment_branches = Some(vec![BranchInput::named("Variant A")]);
    let parent = ExperimentOperations::update(&store, &ctx(), "parent", update, &SiteFlags::default())
        .await
        .unwrap();

    let cloned = ExperimentOperations::clone_experiment(
        &store,
        &RequestContext::new("cloner@example.com"),
        CloneInput {
            parent_slug: "parent".into(),
            name: "Parent Copy".into(),
            rollout_branch_slug: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(cloned.slug, "parent-copy");
    assert_eq!(cloned.owner, "cloner@example.com");
    assert_eq!(cloned.status, Status::Draft);
    assert_eq!(cloned.treatment_branches.len(), 1);
    assert_ne!(
        cloned.reference_branch.as_ref().unwrap().id,
        parent.reference_branch.as_ref().unwrap().id
    );
    assert!(store.get_experiment("parent-copy").await.unwrap().is_some());
}

#[tokio::test]
async fn clone_narrowed_to_branch_is_a_rollout() {
    let store = store();
    create_draft(&store, "Rollout Parent").await;

    let mut update = change("add branches");
    update.reference_branch = Some(BranchInput::named("Control"));
    update.treatment_branches = Some(vec![BranchInput::named("Variant A")]);
    ExperimentOperations::update(&store, &ctx(), "rollout-parent", update, &SiteFlags::default())
        .await
        .unwrap();

    let cloned = ExperimentOperations::clone_experiment(
        &store,
        &ctx(),
        CloneInput {
            parent_slug: "rollout-parent".into(),
            name: "Variant Rollout".into(),
            rollout_branch_slug: Some("variant-a".into()),
        },
    )
    .await
    .unwrap();

    assert!(cloned.is_rollout);
    assert_eq!(cloned.reference_branch.as_ref().unwrap().slug, "variant-a");
    assert!(cloned.treatment_branches.is_empty());

    let err = ExperimentOperations::clone_experiment(
        &store,
        &ctx(),
        CloneInput {
            parent_slug: "rollout-parent".into(),
            name: "Another Rollout".into(),
            rollout_branch_slug: Some("missing-branch".into()),
        },
    )
    .await
    .unwrap_err();
    assert!(err.validation_errors().unwrap().messages_for("rolloutBranchSlug")[0]
        .contains("does not exist"));
}
