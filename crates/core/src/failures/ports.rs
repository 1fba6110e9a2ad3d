//! Port interface for the failures table

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use storesync_domain::{Failure, FailureContext, Result};

/// One failed attempt to fold into the row keyed by `(context, ref_id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureUpsert {
    pub context: FailureContext,
    pub ref_id: Option<String>,
    pub payload: Value,
    pub error: String,
    pub next_retry_at: DateTime<Utc>,
    pub now: DateTime<Utc>,
}

/// Trait for persisting failed mutations
#[async_trait]
pub trait FailureRepository: Send + Sync {
    /// Insert a row, or on an existing `(context, ref_id)` replace payload,
    /// error and `next_retry_at` and increment `attempts`. Returns the row.
    async fn upsert(&self, failure: &FailureUpsert) -> Result<Failure>;

    async fn find(&self, context: FailureContext, ref_id: Option<&str>) -> Result<Option<Failure>>;

    /// Rows with `next_retry_at` unset or at/before `now` and `attempts`
    /// below `max_attempts`, oldest `next_retry_at` first.
    async fn due(&self, now: DateTime<Utc>, max_attempts: u32, limit: usize) -> Result<Vec<Failure>>;

    /// Push `next_retry_at` forward and count one more attempt.
    async fn reschedule(
        &self,
        id: &str,
        next_retry_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<()>;

    async fn count(&self) -> Result<u64>;
}
