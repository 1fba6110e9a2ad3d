//! Periodic replay of due failures
//!
//! Every selected row is rescheduled whether or not it could be dispatched;
//! the next pass re-evaluates it. Rows at the attempt ceiling stay in place
//! for manual inspection.

use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;
use storesync_common::Clock;
use storesync_domain::{FailureRetryConfig, MutationTask, Result};
use tracing::{info, instrument, warn};

use super::ports::FailureRepository;
use crate::mutation::{QueuedTask, TaskQueue};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetryPassSummary {
    pub selected: usize,
    pub dispatched: usize,
    /// Rows whose context or payload cannot be replayed.
    pub skipped: usize,
}

#[derive(Clone)]
pub struct RetryScheduler {
    repository: Arc<dyn FailureRepository>,
    queue: Arc<dyn TaskQueue>,
    clock: Arc<dyn Clock>,
    config: FailureRetryConfig,
}

impl RetryScheduler {
    pub fn new(
        repository: Arc<dyn FailureRepository>,
        queue: Arc<dyn TaskQueue>,
        clock: Arc<dyn Clock>,
        config: FailureRetryConfig,
    ) -> Self {
        Self { repository, queue, clock, config }
    }

    /// One retry pass over the due failures.
    #[instrument(skip(self))]
    pub async fn run_due(&self) -> Result<RetryPassSummary> {
        let now = self.clock.now();
        let due = self
            .repository
            .due(now, self.config.max_attempts, self.config.batch_size)
            .await?;

        let mut summary = RetryPassSummary::default();
        let next_retry_at = now + Duration::seconds(self.config.delay_secs);

        for failure in due.into_iter().filter(|f| f.is_due(now, self.config.max_attempts)) {
            summary.selected += 1;

            match MutationTask::from_replay(failure.context, &failure.payload) {
                Some(task) => {
                    self.queue.enqueue(QueuedTask::new(task)).await?;
                    summary.dispatched += 1;
                }
                None => {
                    warn!(
                        failure_id = %failure.id,
                        context = %failure.context,
                        "failure cannot be replayed"
                    );
                    summary.skipped += 1;
                }
            }

            self.repository.reschedule(&failure.id, next_retry_at, now).await?;
        }

        info!(
            selected = summary.selected,
            dispatched = summary.dispatched,
            skipped = summary.skipped,
            "failure retry pass finished"
        );
        Ok(summary)
    }
}

impl std::fmt::Debug for RetryScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryScheduler").field("config", &self.config).finish_non_exhaustive()
    }
}
