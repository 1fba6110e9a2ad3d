//! Worker pool draining the task queue into the mutation executor
//!
//! Each worker pulls one task at a time. Deferred tasks go back on the queue
//! with their requested delay and keep their delivery number; transient
//! failures are redelivered with backoff until `max_deliveries` is reached.
//! Only the final delivery persists a failure row, which is then left to the
//! retry scheduler, so one outage costs a single attempt against its ceiling.

use std::sync::Arc;
use std::time::Duration;

use storesync_common::BackoffPolicy;
use storesync_core::{MutationExecutor, QueuedTask, TaskOutcome, TaskQueue};
use storesync_domain::constants::MUTATION_TASK_MAX_TRIES;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub workers: usize,
    /// Deliveries per task before a transient failure is no longer requeued.
    pub max_deliveries: u32,
    pub redelivery_backoff: BackoffPolicy,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_deliveries: MUTATION_TASK_MAX_TRIES,
            redelivery_backoff: BackoffPolicy::default(),
        }
    }
}

#[derive(Clone)]
struct WorkerContext {
    queue: Arc<dyn TaskQueue>,
    executor: MutationExecutor,
    config: WorkerPoolConfig,
}

pub struct WorkerPool {
    context: WorkerContext,
    cancellation_token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(queue: Arc<dyn TaskQueue>, executor: MutationExecutor, config: WorkerPoolConfig) -> Self {
        Self {
            context: WorkerContext { queue, executor, config },
            cancellation_token: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    #[instrument(skip(self), fields(workers = self.context.config.workers))]
    pub fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation_token = CancellationToken::new();
        self.handles = (0..self.context.config.workers.max(1))
            .map(|worker| {
                let context = self.context.clone();
                let cancel = self.cancellation_token.clone();
                tokio::spawn(async move { worker_loop(worker, context, cancel).await })
            })
            .collect();

        info!("worker pool started");
        Ok(())
    }

    /// Cancel the workers and wait for in-flight tasks to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }
        self.cancellation_token.cancel();
        self.join().await?;
        info!("worker pool stopped");
        Ok(())
    }

    /// Wait for the workers to exit on their own, which happens once the
    /// queue is closed and drained.
    pub async fn join(&mut self) -> SchedulerResult<()> {
        for handle in self.handles.drain(..) {
            tokio::time::timeout(JOIN_TIMEOUT, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { seconds: JOIN_TIMEOUT.as_secs() })?
                .map_err(|err| SchedulerError::TaskJoinFailed(err.to_string()))?;
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.handles.iter().any(|handle| !handle.is_finished())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.context.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

async fn worker_loop(worker: usize, context: WorkerContext, cancel: CancellationToken) {
    debug!(worker, "worker started");
    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => break,
            next = context.queue.dequeue() => next,
        };

        match next {
            Ok(Some(task)) => process(&context, task).await,
            Ok(None) => break,
            Err(err) => {
                error!(worker, error = %err, "dequeue failed");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(Duration::from_millis(250)) => {}
                }
            }
        }
    }
    debug!(worker, "worker exited");
}

#[instrument(skip(context, task), fields(task_id = %task.id, attempt = task.attempt))]
async fn process(context: &WorkerContext, task: QueuedTask) {
    let final_delivery = task.attempt >= context.config.max_deliveries;
    let outcome = match context.executor.execute_delivery(&task.task, final_delivery).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(error = %err, "task aborted");
            return;
        }
    };

    match outcome {
        TaskOutcome::Deferred(delay) => requeue(context, task, delay).await,
        TaskOutcome::Failed { error } if !final_delivery => {
            let delay = context.config.redelivery_backoff.delay(task.attempt);
            debug!(error = %error, delay = ?delay, "redelivering task");
            requeue(context, task.redeliver(), delay).await;
        }
        TaskOutcome::Failed { error } => {
            warn!(error = %error, "delivery attempts exhausted; failure left for the retry scheduler");
        }
        other => debug!(outcome = ?other, "task finished"),
    }
}

async fn requeue(context: &WorkerContext, task: QueuedTask, delay: Duration) {
    let task_id = task.id.clone();
    if let Err(err) = context.queue.enqueue_after(task, delay).await {
        warn!(task_id = %task_id, error = %err, "failed to requeue task");
    }
}
