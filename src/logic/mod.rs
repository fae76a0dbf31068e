pub mod branch_ops;
pub mod catalog;
pub mod errors;
pub mod experiments;
pub mod review;
pub mod schema_check;
pub mod state_machine;

pub use branch_ops::BranchOperations;
pub use catalog::{ApplicationChannels, ConfigurationSnapshot};
pub use errors::{BranchErrors, FieldErrors, OperationError};
pub use experiments::{ExperimentOperations, RequestContext};
pub use review::{ReviewResult, ReviewValidator, ReviewWarnings};
pub use schema_check::{SchemaCheck, ValueCheck};
pub use state_machine::StateMachine;
