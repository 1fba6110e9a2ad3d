//! Port interface for the shared task queue

use std::time::Duration;

use async_trait::async_trait;
use storesync_domain::Result;

use super::task::QueuedTask;

/// At-least-once task queue feeding the worker pool.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, task: QueuedTask) -> Result<()>;

    /// Make `task` visible again after `delay`. Does not block the caller.
    async fn enqueue_after(&self, task: QueuedTask, delay: Duration) -> Result<()>;

    /// Next task, or `None` once the queue is closed and drained.
    async fn dequeue(&self) -> Result<Option<QueuedTask>>;
}
