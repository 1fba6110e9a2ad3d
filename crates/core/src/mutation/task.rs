use std::time::Duration;

use serde::{Deserialize, Serialize};
use storesync_domain::{new_record_id, MutationTask, SkipReason};

/// Queue envelope around a mutation task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedTask {
    pub id: String,
    pub task: MutationTask,
    /// Delivery number, starting at 1.
    pub attempt: u32,
}

impl QueuedTask {
    pub fn new(task: MutationTask) -> Self {
        Self { id: new_record_id(), task, attempt: 1 }
    }

    /// Same task, next delivery.
    #[must_use]
    pub fn redeliver(self) -> Self {
        Self { attempt: self.attempt.saturating_add(1), ..self }
    }
}

/// Result of executing one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The remote call succeeded.
    Completed,
    /// Nothing to do; an event explains why.
    Skipped(SkipReason),
    /// Circuit open or rate limited; re-enqueue after the delay.
    Deferred(Duration),
    /// Terminal 4xx. A failure row was persisted.
    Rejected { status: u16 },
    /// Transient failure after transport retries; redelivery may succeed.
    /// A failure row is persisted only when this was the final delivery.
    Failed { error: String },
}

impl TaskOutcome {
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
