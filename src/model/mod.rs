pub mod branch;
pub mod changelog;
pub mod common;
pub mod constants;
pub mod experiment;
pub mod reference;

pub use branch::{Branch, BranchInput, FeatureValue, FeatureValueInput, Screenshot, ScreenshotInput};
pub use changelog::{ChangeLogEntry, TaskCommand};
pub use common::{generate_id, slugify, Id, LabelValue};
pub use experiment::{
    Application, BucketRange, Channel, CloneInput, ConclusionRecommendation, DocumentationLink,
    DocumentationLinkKind, Experiment, ExperimentCreate, ExperimentUpdate, FirefoxVersion,
    PublishStatus, Status,
};
pub use reference::{ApplicationConfig, FeatureConfig, Geo, Metric, Outcome, TargetingConfig};
