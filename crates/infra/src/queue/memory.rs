//! In-process task queue
//!
//! Delayed enqueues run on their own timer task and only hold a weak handle to
//! the channel, so closing the queue drops anything still waiting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use storesync_core::{QueuedTask, TaskQueue};
use storesync_domain::{Result, StoreSyncError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

pub struct InMemoryTaskQueue {
    sender: Mutex<Option<UnboundedSender<QueuedTask>>>,
    receiver: tokio::sync::Mutex<UnboundedReceiver<QueuedTask>>,
    delayed: Arc<AtomicUsize>,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender: Mutex::new(Some(sender)),
            receiver: tokio::sync::Mutex::new(receiver),
            delayed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Stop accepting tasks. `dequeue` drains what is already visible, then
    /// returns `None`.
    pub fn close(&self) {
        self.sender.lock().take();
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Tasks waiting on a delayed enqueue timer.
    pub fn delayed_count(&self) -> usize {
        self.delayed.load(Ordering::SeqCst)
    }

    fn sender(&self) -> Result<UnboundedSender<QueuedTask>> {
        self.sender
            .lock()
            .clone()
            .ok_or_else(|| StoreSyncError::Internal("task queue is closed".into()))
    }
}

impl Default for InMemoryTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryTaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTaskQueue")
            .field("closed", &self.is_closed())
            .field("delayed", &self.delayed_count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, task: QueuedTask) -> Result<()> {
        self.sender()?
            .send(task)
            .map_err(|_| StoreSyncError::Internal("task queue is closed".into()))
    }

    async fn enqueue_after(&self, task: QueuedTask, delay: Duration) -> Result<()> {
        if delay.is_zero() {
            return self.enqueue(task).await;
        }

        let weak = self.sender()?.downgrade();
        let delayed = Arc::clone(&self.delayed);
        delayed.fetch_add(1, Ordering::SeqCst);
        debug!(task_id = %task.id, delay = ?delay, "task delayed");

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            delayed.fetch_sub(1, Ordering::SeqCst);
            match weak.upgrade() {
                Some(sender) => {
                    if sender.send(task).is_err() {
                        warn!("queue closed before delayed task became visible");
                    }
                }
                None => warn!(task_id = %task.id, "queue closed; delayed task dropped"),
            }
        });
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<QueuedTask>> {
        Ok(self.receiver.lock().await.recv().await)
    }
}
