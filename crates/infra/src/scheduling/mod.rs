//! Background loops with explicit start/stop lifecycles
//!
//! Every loop owns its join handle and a cancellation token that is recreated
//! on each start, so a stopped scheduler can be started again.

pub mod error;
pub mod failure_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use failure_scheduler::{FailureRetryScheduler, FailureRetrySchedulerConfig};
