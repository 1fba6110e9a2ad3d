//! Port interfaces for run bookkeeping

use async_trait::async_trait;
use serde_json::Value;
use storesync_domain::{Result, SyncCursor, SyncRun};

/// Trait for persisting sync runs
#[async_trait]
pub trait SyncRunRepository: Send + Sync {
    async fn create(&self, run: &SyncRun) -> Result<()>;

    /// Overwrite every mutable column of an existing run.
    async fn update(&self, run: &SyncRun) -> Result<()>;

    async fn find(&self, id: &str) -> Result<Option<SyncRun>>;

    /// Most recently created run, if any.
    async fn latest(&self) -> Result<Option<SyncRun>>;
}

/// Trait for the incremental cursor table
#[async_trait]
pub trait CursorRepository: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<SyncCursor>>;

    /// Insert or overwrite the row for `cursor.key`.
    async fn upsert(&self, cursor: &SyncCursor) -> Result<()>;

    async fn list(&self) -> Result<Vec<SyncCursor>>;
}

/// Helper for reading a numeric field out of a cursor value.
pub(crate) fn cursor_number(value: &Value, field: &str) -> Option<i64> {
    match value.get(field)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
