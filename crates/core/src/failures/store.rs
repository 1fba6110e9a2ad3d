use std::sync::Arc;

use chrono::Duration;
use serde_json::{Map, Value};
use storesync_common::Clock;
use storesync_domain::constants::FAILURE_RETRY_DELAY_SECS;
use storesync_domain::{Failure, FailureContext, MutationTask, Result};
use tracing::warn;

use super::ports::{FailureRepository, FailureUpsert};

/// Records failed mutations with enough payload to replay them.
#[derive(Clone)]
pub struct FailureStore {
    repository: Arc<dyn FailureRepository>,
    clock: Arc<dyn Clock>,
    retry_delay: Duration,
}

impl FailureStore {
    pub fn new(repository: Arc<dyn FailureRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock, retry_delay: Duration::seconds(FAILURE_RETRY_DELAY_SECS) }
    }

    #[must_use]
    pub fn with_retry_delay(mut self, delay_secs: i64) -> Self {
        self.retry_delay = Duration::seconds(delay_secs);
        self
    }

    pub async fn persist(
        &self,
        context: FailureContext,
        ref_id: Option<&str>,
        payload: Value,
        error: &str,
    ) -> Result<Failure> {
        let now = self.clock.now();
        let failure = self
            .repository
            .upsert(&FailureUpsert {
                context,
                ref_id: ref_id.map(str::to_string),
                payload,
                error: error.to_string(),
                next_retry_at: now + self.retry_delay,
                now,
            })
            .await?;

        warn!(
            context = %failure.context,
            ref_id = failure.ref_id.as_deref().unwrap_or("-"),
            attempts = failure.attempts,
            error,
            "failure persisted"
        );
        Ok(failure)
    }

    /// Persist a mutation task's replay payload merged with `extra` fields.
    pub async fn persist_task(
        &self,
        task: &MutationTask,
        error: &str,
        extra: Map<String, Value>,
    ) -> Result<Failure> {
        let mut payload = task.replay_payload();
        if let Value::Object(map) = &mut payload {
            map.extend(extra);
        }
        self.persist(task.failure_context(), Some(task.variant_id()), payload, error).await
    }

    pub async fn find(&self, context: FailureContext, ref_id: Option<&str>) -> Result<Option<Failure>> {
        self.repository.find(context, ref_id).await
    }

    pub async fn pending_count(&self) -> Result<u64> {
        self.repository.count().await
    }
}

impl std::fmt::Debug for FailureStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureStore").field("retry_delay", &self.retry_delay).finish_non_exhaustive()
    }
}
