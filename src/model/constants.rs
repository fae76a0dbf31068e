use crate::model::experiment::{FirefoxVersion, PublishStatus, Status};

pub const MAX_PRIMARY_OUTCOMES: usize = 2;

/// Size of the bucket-allocation namespace.
pub const BUCKET_TOTAL: u32 = 10_000;

/// Smallest population percent accepted at the review gate.
pub const POPULATION_PERCENT_MIN: f64 = 0.00009;

pub const HYPOTHESIS_DEFAULT: &str = "If we <do this/build this/create this change in the \
experiment> for <these users>, then we will see <this outcome>.";

/// Desktop clients at or above this version require `enabled` on every
/// branch feature value.
pub const FEATURE_ENABLED_MIN_REQUIRED_VERSION: FirefoxVersion = FirefoxVersion::new(91);

/// Statuses under which ordinary field edits are allowed.
pub const STATUS_ALLOWS_UPDATE: &[Status] = &[Status::Draft, Status::Preview];

/// Publish statuses under which ordinary field edits are allowed.
pub const PUBLISH_STATUS_ALLOWS_UPDATE: &[PublishStatus] =
    &[PublishStatus::Idle, PublishStatus::Review];

/// Fields that may change even while a status axis is locked.
pub const STATUS_UPDATE_EXEMPT_FIELDS: &[&str] = &[
    "isArchived",
    "publishStatus",
    "status",
    "statusNext",
    "takeawaysSummary",
    "conclusionRecommendation",
    "changelogMessage",
];

/// Fields that may change on an archived experiment.
pub const ARCHIVE_UPDATE_EXEMPT_FIELDS: &[&str] = &["isArchived", "changelogMessage"];

/// Direct `status` writes. Live and Complete are reached through the
/// `statusNext` proposal plus the publish workflow, never written directly.
pub fn valid_status_transitions(current: Status) -> &'static [Status] {
    match current {
        Status::Draft => &[Status::Preview],
        Status::Preview => &[Status::Draft],
        Status::Live | Status::Complete => &[],
    }
}

pub fn valid_publish_status_transitions(current: PublishStatus) -> &'static [PublishStatus] {
    match current {
        PublishStatus::Idle => &[PublishStatus::Review],
        PublishStatus::Review => &[PublishStatus::Idle, PublishStatus::Approved],
        PublishStatus::Approved => &[PublishStatus::Idle, PublishStatus::Waiting],
        PublishStatus::Waiting => &[PublishStatus::Idle],
    }
}

/// Valid `statusNext` proposals keyed by the current status.
pub fn valid_status_next_values(current: Status) -> &'static [Status] {
    match current {
        Status::Draft => &[Status::Live],
        Status::Live => &[Status::Live, Status::Complete],
        Status::Preview | Status::Complete => &[],
    }
}

pub const ERROR_NAME_REQUIRED: &str = "Name is required to create an experiment";
pub const ERROR_NAME_INVALID: &str = "Name needs to contain alphanumeric characters";
pub const ERROR_SLUG_DUPLICATE: &str =
    "Name maps to a pre-existing slug, please choose another name";
pub const ERROR_DUPLICATE_BRANCH_NAME: &str = "Branch names must be unique within an experiment";
pub const ERROR_DUPLICATE_BRANCH_FEATURE_VALUE: &str =
    "A branch can not have multiple configurations for the same feature";
pub const ERROR_BRANCH_NO_VALUE: &str = "A value must be supplied for an enabled feature";
pub const ERROR_BRANCH_NO_ENABLED: &str = "A feature must be enabled to set its value";
pub const ERROR_REQUIRED_FIELD: &str = "This field may not be blank.";
pub const ERROR_REQUIRED_QUESTION: &str = "This question may not be blank.";
pub const ERROR_REQUIRED_FEATURE_CONFIG: &str =
    "You must select a feature configuration from the drop down.";
pub const ERROR_LAUNCHING_DISABLED: &str =
    "Launching experiments has been temporarily disabled by the site administrators.";
pub const ERROR_POPULATION_PERCENT_MIN: &str =
    "Ensure this value is greater than or equal to 0.0001.";
pub const ERROR_SINGLE_BRANCH_FOR_ROLLOUT: &str = "A rollout may have only a single branch";
pub const ERROR_FIREFOX_VERSION_MIN: &str =
    "The minimum version must be less than or equal to the maximum version.";
pub const ERROR_FIREFOX_VERSION_MAX: &str =
    "The maximum version must be greater than or equal to the minimum version.";
pub const ERROR_FEATURE_ENABLED: &str =
    "This feature must be enabled on this version of Firefox.";
pub const ERROR_HYPOTHESIS_DEFAULT: &str = "Hypothesis cannot be the default value.";
pub const ERROR_ENROLLMENT_EXCEEDS_DURATION: &str =
    "The enrollment duration must be less than or equal to the experiment duration.";
pub const ERROR_PRIMARY_SECONDARY_OUTCOMES_OVERLAP: &str =
    "Primary outcomes cannot overlap with secondary outcomes.";
