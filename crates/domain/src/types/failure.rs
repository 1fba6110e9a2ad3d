//! Durable failures awaiting retry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which mutation kind a failure replays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureContext {
    UpstreamFetch,
    DownstreamUpdatePrice,
    DownstreamUpdateStock,
}

crate::impl_wire_conversions!(FailureContext {
    UpstreamFetch => "UPSTREAM_FETCH",
    DownstreamUpdatePrice => "DOWNSTREAM_UPDATE_PRICE",
    DownstreamUpdateStock => "DOWNSTREAM_UPDATE_STOCK",
});

/// One durably-failed mutation. `(context, ref_id)` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub id: String,
    pub context: FailureContext,
    pub ref_id: Option<String>,
    pub payload: Value,
    pub last_error: Option<String>,
    pub attempts: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Failure {
    /// Eligible for the retry scheduler at `now` under `ceiling` attempts.
    pub fn is_due(&self, now: DateTime<Utc>, ceiling: u32) -> bool {
        self.attempts < ceiling && self.next_retry_at.map_or(true, |at| at <= now)
    }
}
