pub mod config;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

// Export logic types
pub use logic::{
    BranchOperations, ConfigurationSnapshot, ExperimentOperations, FieldErrors, OperationError,
    RequestContext, ReviewResult, ReviewValidator, SchemaCheck, StateMachine,
};

// Export all model types
pub use model::*;

// Export store types
pub use store::{InMemoryStore, ReferenceData, Store};

pub use config::{init_logging, AppConfig, SiteFlags};
