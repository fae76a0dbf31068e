use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::branch::{Branch, BranchInput};
use crate::model::common::{slugify, Id};
use crate::model::constants::{BUCKET_TOTAL, HYPOTHESIS_DEFAULT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Draft,
    Preview,
    Live,
    Complete,
}

impl Status {
    pub fn label(&self) -> &'static str {
        match self {
            Status::Draft => "Draft",
            Status::Preview => "Preview",
            Status::Live => "Live",
            Status::Complete => "Complete",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Workflow state tracking promotion to the live configuration store,
/// independent of `Status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublishStatus {
    Idle,
    Review,
    Approved,
    Waiting,
}

impl PublishStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PublishStatus::Idle => "Idle",
            PublishStatus::Review => "Review",
            PublishStatus::Approved => "Approved",
            PublishStatus::Waiting => "Waiting",
        }
    }
}

impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Application {
    Desktop,
    Fenix,
    Ios,
    FocusAndroid,
    FocusIos,
}

impl Application {
    pub const ALL: &'static [Application] = &[
        Application::Desktop,
        Application::Fenix,
        Application::Ios,
        Application::FocusAndroid,
        Application::FocusIos,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Application::Desktop => "Firefox Desktop",
            Application::Fenix => "Firefox for Android (Fenix)",
            Application::Ios => "Firefox for iOS",
            Application::FocusAndroid => "Focus for Android",
            Application::FocusIos => "Focus for iOS",
        }
    }

    pub fn value(&self) -> &'static str {
        match self {
            Application::Desktop => "DESKTOP",
            Application::Fenix => "FENIX",
            Application::Ios => "IOS",
            Application::FocusAndroid => "FOCUS_ANDROID",
            Application::FocusIos => "FOCUS_IOS",
        }
    }
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    NoChannel,
    Unbranded,
    Nightly,
    Beta,
    Release,
    Esr,
    Testflight,
}

impl Channel {
    pub const ALL: &'static [Channel] = &[
        Channel::NoChannel,
        Channel::Unbranded,
        Channel::Nightly,
        Channel::Beta,
        Channel::Release,
        Channel::Esr,
        Channel::Testflight,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Channel::NoChannel => "No Channel",
            Channel::Unbranded => "Unbranded",
            Channel::Nightly => "Nightly",
            Channel::Beta => "Beta",
            Channel::Release => "Release",
            Channel::Esr => "ESR",
            Channel::Testflight => "Testflight",
        }
    }

    pub fn value(&self) -> &'static str {
        match self {
            Channel::NoChannel => "NO_CHANNEL",
            Channel::Unbranded => "UNBRANDED",
            Channel::Nightly => "NIGHTLY",
            Channel::Beta => "BETA",
            Channel::Release => "RELEASE",
            Channel::Esr => "ESR",
            Channel::Testflight => "TESTFLIGHT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConclusionRecommendation {
    Rerun,
    Graduate,
    ChangeCourse,
    Stop,
    FollowUp,
}

impl ConclusionRecommendation {
    pub fn label(&self) -> &'static str {
        match self {
            ConclusionRecommendation::Rerun => "Rerun",
            ConclusionRecommendation::Graduate => "Graduate",
            ConclusionRecommendation::ChangeCourse => "Change course",
            ConclusionRecommendation::Stop => "Stop",
            ConclusionRecommendation::FollowUp => "Run follow ups",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentationLinkKind {
    DsJira,
    DesignDoc,
    EngTicket,
}

impl DocumentationLinkKind {
    pub fn label(&self) -> &'static str {
        match self {
            DocumentationLinkKind::DsJira => "Data Science Jira Ticket",
            DocumentationLinkKind::DesignDoc => "Experiment Design Document",
            DocumentationLinkKind::EngTicket => "Engineering Ticket",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentationLink {
    pub title: DocumentationLinkKind,
    pub link: String,
}

/// A browser version as used for min/max targeting bounds. Ordered by
/// (major, minor); serialized as "major.minor".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FirefoxVersion {
    pub major: u32,
    pub minor: u32,
}

impl FirefoxVersion {
    pub const fn new(major: u32) -> Self {
        Self { major, minor: 0 }
    }
}

impl fmt::Display for FirefoxVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for FirefoxVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(2, '.');
        let major = parts
            .next()
            .unwrap_or("")
            .parse::<u32>()
            .map_err(|_| format!("invalid version: '{s}'"))?;
        // Wildcard minors ("101.*") collapse to .0 for comparison purposes.
        let minor = match parts.next() {
            None | Some("*") | Some("") => 0,
            Some(m) => m
                .parse::<u32>()
                .map_err(|_| format!("invalid version: '{s}'"))?,
        };
        Ok(Self { major, minor })
    }
}

impl TryFrom<String> for FirefoxVersion {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FirefoxVersion> for String {
    fn from(value: FirefoxVersion) -> Self {
        value.to_string()
    }
}

/// Sampling-range assignment determining what fraction of the eligible
/// population enters the experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketRange {
    pub start: u32,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub slug: Id,
    pub name: String,
    pub owner: String,
    pub application: Application,
    pub channel: Channel,
    pub status: Status,
    pub status_next: Option<Status>,
    pub publish_status: PublishStatus,
    pub public_description: String,
    pub hypothesis: String,
    pub risk_mitigation_link: String,
    pub documentation_links: Vec<DocumentationLink>,
    /// Associated feature config slugs, kept sorted.
    pub feature_configs: Vec<Id>,
    pub warn_feature_schema: bool,
    pub targeting_config_slug: Option<Id>,
    pub population_percent: f64,
    pub total_enrolled_clients: Option<u64>,
    pub proposed_enrollment: Option<u32>,
    pub proposed_duration: Option<u32>,
    pub firefox_min_version: Option<FirefoxVersion>,
    pub firefox_max_version: Option<FirefoxVersion>,
    pub primary_outcomes: Vec<Id>,
    pub secondary_outcomes: Vec<Id>,
    pub countries: Vec<Id>,
    pub locales: Vec<Id>,
    pub languages: Vec<Id>,
    pub is_archived: bool,
    pub is_rollout: bool,
    pub is_sticky: bool,
    pub is_first_run: bool,
    pub is_paused: bool,
    pub risk_brand: Option<bool>,
    pub risk_partner_related: Option<bool>,
    pub risk_revenue: Option<bool>,
    pub takeaways_summary: Option<String>,
    pub conclusion_recommendation: Option<ConclusionRecommendation>,
    pub reference_branch: Option<Branch>,
    pub treatment_branches: Vec<Branch>,
    pub bucket_range: Option<BucketRange>,
    /// Actor who moved the experiment into Review; used to block
    /// self-approval.
    pub review_requested_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Experiment {
    pub fn new(
        name: impl Into<String>,
        owner: impl Into<String>,
        application: Application,
        channel: Channel,
    ) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self {
            slug: slugify(&name),
            name,
            owner: owner.into(),
            application,
            channel,
            status: Status::Draft,
            status_next: None,
            publish_status: PublishStatus::Idle,
            public_description: String::new(),
            hypothesis: HYPOTHESIS_DEFAULT.to_string(),
            risk_mitigation_link: String::new(),
            documentation_links: Vec::new(),
            feature_configs: Vec::new(),
            warn_feature_schema: false,
            targeting_config_slug: None,
            population_percent: 0.0,
            total_enrolled_clients: None,
            proposed_enrollment: None,
            proposed_duration: None,
            firefox_min_version: None,
            firefox_max_version: None,
            primary_outcomes: Vec::new(),
            secondary_outcomes: Vec::new(),
            countries: Vec::new(),
            locales: Vec::new(),
            languages: Vec::new(),
            is_archived: false,
            is_rollout: false,
            is_sticky: false,
            is_first_run: false,
            is_paused: false,
            risk_brand: None,
            risk_partner_related: None,
            risk_revenue: None,
            takeaways_summary: None,
            conclusion_recommendation: None,
            reference_branch: None,
            treatment_branches: Vec::new(),
            bucket_range: None,
            review_requested_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reference branch followed by treatment branches, in order.
    pub fn branches(&self) -> impl Iterator<Item = &Branch> {
        self.reference_branch.iter().chain(self.treatment_branches.iter())
    }

    pub fn branch_by_slug(&self, slug: &str) -> Option<&Branch> {
        self.branches().find(|b| b.slug == slug)
    }

    /// Bucket allocation applies to experiments visible to clients: in
    /// Preview, or proposing to go Live.
    pub fn should_allocate_buckets(&self) -> bool {
        !self.is_archived
            && (self.status == Status::Preview || self.status_next == Some(Status::Live))
    }

    pub fn allocate_bucket_range(&mut self) {
        let count = ((self.population_percent / 100.0) * BUCKET_TOTAL as f64).round() as u32;
        self.bucket_range = Some(BucketRange {
            start: 0,
            count: count.min(BUCKET_TOTAL),
        });
    }

    /// Derive a new Draft experiment from this one, optionally narrowed to a
    /// single rollout branch.
    pub fn clone_as(
        &self,
        name: &str,
        owner: &str,
        rollout_branch_slug: Option<&str>,
    ) -> Experiment {
        let mut cloned = self.clone();
        let now = Utc::now();
        cloned.slug = slugify(name);
        cloned.name = name.to_string();
        cloned.owner = owner.to_string();
        cloned.status = Status::Draft;
        cloned.status_next = None;
        cloned.publish_status = PublishStatus::Idle;
        cloned.is_archived = false;
        cloned.is_paused = false;
        cloned.bucket_range = None;
        cloned.review_requested_by = None;
        cloned.takeaways_summary = None;
        cloned.conclusion_recommendation = None;
        cloned.created_at = now;
        cloned.updated_at = now;

        if let Some(branch_slug) = rollout_branch_slug {
            // Narrowing to one branch produces a rollout of that branch.
            cloned.reference_branch = self.branch_by_slug(branch_slug).map(Branch::duplicate);
            cloned.treatment_branches = Vec::new();
            cloned.is_rollout = true;
        } else {
            cloned.reference_branch = self.reference_branch.as_ref().map(Branch::duplicate);
            cloned.treatment_branches = self
                .treatment_branches
                .iter()
                .map(Branch::duplicate)
                .collect();
        }

        cloned
    }
}

/// Input for the explicit create operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentCreate {
    pub name: String,
    pub application: Application,
    #[serde(default)]
    pub hypothesis: Option<String>,
    #[serde(default)]
    pub public_description: Option<String>,
    pub changelog_message: String,
}

/// Partial-update payload. `None` means "field not supplied"; the state
/// machine's field locks operate on the supplied set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExperimentUpdate {
    pub name: Option<String>,
    pub channel: Option<Channel>,
    pub public_description: Option<String>,
    pub hypothesis: Option<String>,
    pub risk_mitigation_link: Option<String>,
    pub documentation_links: Option<Vec<DocumentationLink>>,
    pub reference_branch: Option<BranchInput>,
    pub treatment_branches: Option<Vec<BranchInput>>,
    /// Legacy single feature config association.
    pub feature_config: Option<Id>,
    pub feature_configs: Option<Vec<Id>>,
    pub warn_feature_schema: Option<bool>,
    pub targeting_config_slug: Option<Id>,
    pub population_percent: Option<f64>,
    pub total_enrolled_clients: Option<u64>,
    pub proposed_enrollment: Option<u32>,
    pub proposed_duration: Option<u32>,
    pub firefox_min_version: Option<FirefoxVersion>,
    pub firefox_max_version: Option<FirefoxVersion>,
    pub primary_outcomes: Option<Vec<Id>>,
    pub secondary_outcomes: Option<Vec<Id>>,
    pub countries: Option<Vec<Id>>,
    pub locales: Option<Vec<Id>>,
    pub languages: Option<Vec<Id>>,
    pub is_archived: Option<bool>,
    pub is_rollout: Option<bool>,
    pub is_sticky: Option<bool>,
    pub is_first_run: Option<bool>,
    pub is_paused: Option<bool>,
    pub risk_brand: Option<bool>,
    pub risk_partner_related: Option<bool>,
    pub risk_revenue: Option<bool>,
    pub takeaways_summary: Option<String>,
    pub conclusion_recommendation: Option<ConclusionRecommendation>,
    pub status: Option<Status>,
    /// Outer `None` means "field absent"; `Some(None)` is an explicit null
    /// clearing the proposal.
    #[serde(default, deserialize_with = "explicit_null")]
    pub status_next: Option<Option<Status>>,
    pub publish_status: Option<PublishStatus>,
    pub changelog_message: String,
}

/// Maps a present-but-null field to `Some(None)` so it stays
/// distinguishable from an absent field.
fn explicit_null<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl ExperimentUpdate {
    /// External names of every supplied field, for the state-machine and
    /// archive field locks.
    pub fn provided_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        macro_rules! track {
            ($field:ident, $name:literal) => {
                if self.$field.is_some() {
                    fields.push($name);
                }
            };
        }
        track!(name, "name");
        track!(channel, "channel");
        track!(public_description, "publicDescription");
        track!(hypothesis, "hypothesis");
        track!(risk_mitigation_link, "riskMitigationLink");
        track!(documentation_links, "documentationLinks");
        track!(reference_branch, "referenceBranch");
        track!(treatment_branches, "treatmentBranches");
        track!(feature_config, "featureConfig");
        track!(feature_configs, "featureConfigs");
        track!(warn_feature_schema, "warnFeatureSchema");
        track!(targeting_config_slug, "targetingConfigSlug");
        track!(population_percent, "populationPercent");
        track!(total_enrolled_clients, "totalEnrolledClients");
        track!(proposed_enrollment, "proposedEnrollment");
        track!(proposed_duration, "proposedDuration");
        track!(firefox_min_version, "firefoxMinVersion");
        track!(firefox_max_version, "firefoxMaxVersion");
        track!(primary_outcomes, "primaryOutcomes");
        track!(secondary_outcomes, "secondaryOutcomes");
        track!(countries, "countries");
        track!(locales, "locales");
        track!(languages, "languages");
        track!(is_archived, "isArchived");
        track!(is_rollout, "isRollout");
        track!(is_sticky, "isSticky");
        track!(is_first_run, "isFirstRun");
        track!(is_paused, "isEnrollmentPaused");
        track!(risk_brand, "riskBrand");
        track!(risk_partner_related, "riskPartnerRelated");
        track!(risk_revenue, "riskRevenue");
        track!(takeaways_summary, "takeawaysSummary");
        track!(conclusion_recommendation, "conclusionRecommendation");
        track!(status, "status");
        track!(status_next, "statusNext");
        track!(publish_status, "publishStatus");
        fields
    }
}

/// Input for the clone operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneInput {
    pub parent_slug: Id,
    pub name: String,
    #[serde(default)]
    pub rollout_branch_slug: Option<Id>,
}
