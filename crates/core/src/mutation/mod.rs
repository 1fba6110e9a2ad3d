//! Asynchronous downstream mutation tasks

pub mod executor;
pub mod ports;
pub mod task;

pub use executor::{MutationExecutor, MutationSettings};
pub use ports::TaskQueue;
pub use task::{QueuedTask, TaskOutcome};
