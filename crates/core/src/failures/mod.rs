//! Durable failure store and the retry pass that replays it

pub mod ports;
pub mod scheduler;
pub mod store;

pub use ports::{FailureRepository, FailureUpsert};
pub use scheduler::{RetryPassSummary, RetryScheduler};
pub use store::FailureStore;
