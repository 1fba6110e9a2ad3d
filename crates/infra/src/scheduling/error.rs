//! Scheduler error types

use storesync_domain::StoreSyncError;
use thiserror::Error;

use crate::errors::InfraError;

/// Lifecycle errors for background loops and worker pools
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler already running")]
    AlreadyRunning,

    #[error("scheduler not running")]
    NotRunning,

    #[error("operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("task join failed: {0}")]
    TaskJoinFailed(String),
}

impl From<SchedulerError> for InfraError {
    fn from(err: SchedulerError) -> Self {
        let inner = match err {
            SchedulerError::AlreadyRunning | SchedulerError::NotRunning => {
                StoreSyncError::InvalidInput(err.to_string())
            }
            _ => StoreSyncError::Internal(err.to_string()),
        };
        InfraError(inner)
    }
}

impl From<SchedulerError> for StoreSyncError {
    fn from(err: SchedulerError) -> Self {
        InfraError::from(err).into()
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
