use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Incremental state persisted between runs, one row per key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncCursor {
    pub key: String,
    pub value: Value,
    pub updated_at: DateTime<Utc>,
}
