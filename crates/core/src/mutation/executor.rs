//! Single downstream price/stock mutation
//!
//! Gates run in order: enablement, idempotency, circuit, rate limit. Only a
//! task that clears all four reaches the network.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use storesync_common::{CircuitBreaker, RateLimiter};
use storesync_domain::constants::{
    CIRCUIT_OPEN_RELEASE_SECS, DEFAULT_RATE_LIMIT_PER_MINUTE, DOWNSTREAM_SERVICE,
    RATE_LIMITED_RELEASE_SECS, RATE_LIMIT_WINDOW_SECS,
};
use storesync_domain::{
    DownstreamConfig, EventType, MutationTask, Result, SkipReason, StoreSyncError,
};
use tracing::{debug, instrument};

use super::task::TaskOutcome;
use crate::audit::{EventRecorder, IdempotencyDecision, IdempotencyGuard};
use crate::catalog::writer::append_error_fields;
use crate::errors::map_kv_error;
use crate::failures::FailureStore;
use crate::remote_ports::{DownstreamApi, RequestContext};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationSettings {
    pub enabled: bool,
    pub rate_limit_per_minute: u32,
    /// Redelivery delay while the downstream circuit is open.
    pub circuit_release: Duration,
    /// Redelivery delay after hitting the per-minute budget.
    pub rate_limited_release: Duration,
}

impl MutationSettings {
    pub fn from_config(config: &DownstreamConfig) -> Self {
        Self { enabled: config.enabled, rate_limit_per_minute: config.rate_limit_per_minute, ..Self::default() }
    }
}

impl Default for MutationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
            circuit_release: Duration::from_secs(CIRCUIT_OPEN_RELEASE_SECS),
            rate_limited_release: Duration::from_secs(RATE_LIMITED_RELEASE_SECS),
        }
    }
}

#[derive(Clone)]
pub struct MutationExecutor {
    downstream: Arc<dyn DownstreamApi>,
    guard: IdempotencyGuard,
    breaker: CircuitBreaker,
    limiter: RateLimiter,
    events: EventRecorder,
    failures: FailureStore,
    settings: MutationSettings,
}

impl MutationExecutor {
    pub fn new(
        downstream: Arc<dyn DownstreamApi>,
        guard: IdempotencyGuard,
        breaker: CircuitBreaker,
        limiter: RateLimiter,
        events: EventRecorder,
        failures: FailureStore,
    ) -> Self {
        Self {
            downstream,
            guard,
            breaker,
            limiter,
            events,
            failures,
            settings: MutationSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: MutationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub const fn settings(&self) -> &MutationSettings {
        &self.settings
    }

    /// Execute a task as its only delivery; transient failures are persisted.
    pub async fn execute(&self, task: &MutationTask) -> Result<TaskOutcome> {
        self.execute_delivery(task, true).await
    }

    /// Execute one queue delivery. A transient failure is persisted only on
    /// the `final_delivery`; earlier ones are left for redelivery.
    #[instrument(skip(self, task), fields(variant_id = task.variant_id(), run_id = task.run_id()))]
    pub async fn execute_delivery(
        &self,
        task: &MutationTask,
        final_delivery: bool,
    ) -> Result<TaskOutcome> {
        let run_id = task.run_id();
        let variant_id = task.variant_id();

        if !self.settings.enabled {
            self.skip(task, SkipReason::DownstreamDisabled).await?;
            return Ok(TaskOutcome::Skipped(SkipReason::DownstreamDisabled));
        }

        let key = match self.guard.check_task(task).await? {
            IdempotencyDecision::AlreadyApplied { .. } => {
                self.skip(task, SkipReason::IdempotentHit).await?;
                return Ok(TaskOutcome::Skipped(SkipReason::IdempotentHit));
            }
            IdempotencyDecision::Proceed { key } => key,
        };

        if self.breaker.is_open(DOWNSTREAM_SERVICE).await.map_err(map_kv_error)? {
            self.skip(task, SkipReason::CircuitOpen).await?;
            return Ok(TaskOutcome::Deferred(self.settings.circuit_release));
        }

        let bucket = self.limiter.minute_bucket(DOWNSTREAM_SERVICE);
        if self
            .limiter
            .too_many_attempts(&bucket, self.settings.rate_limit_per_minute)
            .await
            .map_err(map_kv_error)?
        {
            self.events
                .warning(
                    run_id,
                    EventType::RateLimited,
                    json!({ "variant_id": variant_id, "limit": self.settings.rate_limit_per_minute }),
                    Some(variant_id),
                )
                .await?;
            return Ok(TaskOutcome::Deferred(self.settings.rate_limited_release));
        }
        self.limiter
            .hit(&bucket, Duration::from_secs(RATE_LIMIT_WINDOW_SECS))
            .await
            .map_err(map_kv_error)?;

        let ctx = RequestContext::for_run(run_id).with_idempotency_key(key);
        let result = match task {
            MutationTask::UpdatePrice(update) => self.downstream.update_price(update, &ctx).await,
            MutationTask::UpdateStock(update) => self.downstream.update_stock(update, &ctx).await,
        };

        match result {
            Ok(_) => {
                self.events
                    .info(run_id, task.event_type(), Value::Object(event_payload(task)), Some(variant_id))
                    .await?;
                debug!("mutation applied");
                Ok(TaskOutcome::Completed)
            }
            Err(StoreSyncError::CircuitOpen(_)) => {
                self.skip(task, SkipReason::CircuitOpen).await?;
                Ok(TaskOutcome::Deferred(self.settings.circuit_release))
            }
            Err(err) if err.status().is_some() || err.is_transient() => {
                self.fail(task, err, final_delivery).await
            }
            Err(err) => {
                self.record_error(task, &err).await?;
                Err(err)
            }
        }
    }

    async fn record_error(&self, task: &MutationTask, err: &StoreSyncError) -> Result<()> {
        let mut payload = event_payload(task);
        append_error_fields(&mut payload, err);
        self.events
            .error(task.run_id(), task.event_type(), Value::Object(payload), Some(task.variant_id()))
            .await?;
        Ok(())
    }

    async fn fail(
        &self,
        task: &MutationTask,
        err: StoreSyncError,
        final_delivery: bool,
    ) -> Result<TaskOutcome> {
        let run_id = task.run_id();
        let variant_id = task.variant_id();
        self.record_error(task, &err).await?;

        let mut extra = Map::new();
        append_error_fields(&mut extra, &err);
        let message = err.to_string();

        match err.status() {
            Some(status) if err.is_terminal_remote() => {
                self.failures.persist_task(task, &message, extra).await?;

                let mut details = event_payload(task);
                details.insert("status".into(), json!(status));
                self.events
                    .error(
                        run_id,
                        EventType::ValidationFailed,
                        Value::Object(details),
                        Some(variant_id),
                    )
                    .await?;
                Ok(TaskOutcome::Rejected { status })
            }
            _ => {
                if final_delivery {
                    self.failures.persist_task(task, &message, extra).await?;
                }
                Ok(TaskOutcome::Failed { error: message })
            }
        }
    }

    async fn skip(&self, task: &MutationTask, reason: SkipReason) -> Result<()> {
        let source = match task {
            MutationTask::UpdatePrice(update) => update.source_variant_id.as_deref(),
            MutationTask::UpdateStock(update) => update.source_variant_id.as_deref(),
        };
        let mut payload = Map::new();
        payload.insert("reason".into(), json!(reason.as_str()));
        payload.insert("variant_id".into(), json!(task.variant_id()));
        if let Some(source) = source {
            payload.insert("source_variant_id".into(), json!(source));
        }

        let payload = Value::Object(payload);
        let ref_id = Some(task.variant_id());
        match reason {
            SkipReason::IdempotentHit => {
                self.events.info(task.run_id(), EventType::Skipped, payload, ref_id).await?;
            }
            _ => {
                self.events.warning(task.run_id(), EventType::Skipped, payload, ref_id).await?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for MutationExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationExecutor").field("settings", &self.settings).finish_non_exhaustive()
    }
}

/// The mutation's effective fields, as carried by its timeline events.
fn event_payload(task: &MutationTask) -> Map<String, Value> {
    let mut payload = Map::new();
    match task {
        MutationTask::UpdatePrice(update) => {
            payload.insert("variant_id".into(), json!(update.variant_id));
            payload.insert("price".into(), json!(update.price));
            if let Some(discount) = update.discount_price {
                payload.insert("discount_price".into(), json!(discount));
            }
            if let Some(raw) = update.has_raw_price {
                payload.insert("has_raw_price".into(), json!(raw));
            }
            if let Some(source) = &update.source_variant_id {
                payload.insert("source_variant_id".into(), json!(source));
            }
        }
        MutationTask::UpdateStock(update) => {
            payload.insert("variant_id".into(), json!(update.variant_id));
            payload.insert("stock".into(), json!(update.stock));
            payload.insert("is_relative".into(), json!(update.is_relative));
            if let Some(source) = &update.source_variant_id {
                payload.insert("source_variant_id".into(), json!(source));
            }
        }
    }
    payload
}
