//! Periodic replay of persisted failures.
//!
//! Wraps [`RetryScheduler::run_due`] in an interval loop with an explicit
//! lifecycle. Each pass is bounded by `pass_timeout`; a pass that errors or
//! times out is logged and the loop carries on with the next tick.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use storesync_core::RetryScheduler;
//! use storesync_infra::scheduling::{FailureRetryScheduler, FailureRetrySchedulerConfig};
//!
//! # async fn example(retry: Arc<RetryScheduler>) -> Result<(), storesync_domain::StoreSyncError> {
//! let mut scheduler = FailureRetryScheduler::new(retry, FailureRetrySchedulerConfig::default());
//! scheduler.start().await?;
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use storesync_core::{RetryPassSummary, RetryScheduler};
use storesync_domain::{FailureRetryConfig, Result, StoreSyncError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use super::error::{SchedulerError, SchedulerResult};

type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRetrySchedulerConfig {
    pub interval: Duration,
    pub pass_timeout: Duration,
}

impl FailureRetrySchedulerConfig {
    pub fn from_config(config: &FailureRetryConfig) -> Self {
        Self { interval: Duration::from_secs(config.interval_secs.max(1)), ..Self::default() }
    }
}

impl Default for FailureRetrySchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            pass_timeout: Duration::from_secs(60),
        }
    }
}

pub struct FailureRetryScheduler {
    retry: Arc<RetryScheduler>,
    config: FailureRetrySchedulerConfig,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl FailureRetryScheduler {
    pub fn new(retry: Arc<RetryScheduler>, config: FailureRetrySchedulerConfig) -> Self {
        Self {
            retry,
            config,
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        // Fresh token so a stopped scheduler can restart.
        self.cancellation_token = CancellationToken::new();

        let retry = Arc::clone(&self.retry);
        let config = self.config.clone();
        let cancel = self.cancellation_token.clone();
        let handle = tokio::spawn(async move {
            Self::retry_loop(retry, config, cancel).await;
        });
        *self.task_handle.lock().await = Some(handle);

        info!(interval = ?self.config.interval, "failure retry scheduler started");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            let join_timeout = Duration::from_secs(5);
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { seconds: join_timeout.as_secs() })?
                .map_err(|err| SchedulerError::TaskJoinFailed(err.to_string()))?;
        }

        info!("failure retry scheduler stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Run one pass immediately, outside the interval.
    pub async fn run_once(&self) -> Result<RetryPassSummary> {
        Self::run_pass(&self.retry, &self.config).await
    }

    async fn run_pass(
        retry: &RetryScheduler,
        config: &FailureRetrySchedulerConfig,
    ) -> Result<RetryPassSummary> {
        tokio::time::timeout(config.pass_timeout, retry.run_due()).await.map_err(|_| {
            StoreSyncError::Internal(format!(
                "retry pass timed out after {}s",
                config.pass_timeout.as_secs()
            ))
        })?
    }

    async fn retry_loop(
        retry: Arc<RetryScheduler>,
        config: FailureRetrySchedulerConfig,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("failure retry loop cancelled");
                    break;
                }
                () = tokio::time::sleep(config.interval) => {
                    let started = Instant::now();
                    match Self::run_pass(&retry, &config).await {
                        Ok(summary) => debug!(
                            selected = summary.selected,
                            dispatched = summary.dispatched,
                            elapsed = ?started.elapsed(),
                            "retry tick finished"
                        ),
                        Err(err) => error!(error = %err, "retry pass failed"),
                    }
                }
            }
        }
    }
}

impl Drop for FailureRetryScheduler {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

impl std::fmt::Debug for FailureRetryScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureRetryScheduler")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
