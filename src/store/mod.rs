pub mod memory;
pub mod traits;

pub use memory::{InMemoryStore, QueuedTask, ReferenceData};
pub use traits::{ChangeLogStore, ExperimentStore, ReferenceStore, Store, TaskQueue};
