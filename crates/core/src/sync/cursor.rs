//! Incremental pagination state persisted between runs

use std::sync::Arc;

use serde_json::{json, Value};
use storesync_common::Clock;
use storesync_domain::constants::{
    CURSOR_DOWNSTREAM_PRODUCTS_PAGE, CURSOR_PRODUCTS_PAGE, CURSOR_PRODUCTS_SINCE,
};
use storesync_domain::{Result, SyncCursor};
use tracing::debug;

use super::ports::{cursor_number, CursorRepository};

#[derive(Clone)]
pub struct CursorStore {
    repository: Arc<dyn CursorRepository>,
    clock: Arc<dyn Clock>,
}

impl CursorStore {
    pub fn new(repository: Arc<dyn CursorRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.repository.get(key).await?.map(|cursor| cursor.value))
    }

    /// Overwrite the value stored under `key`.
    pub async fn put(&self, key: &str, value: Value) -> Result<SyncCursor> {
        let cursor = SyncCursor { key: key.to_string(), value, updated_at: self.clock.now() };
        self.repository.upsert(&cursor).await?;
        debug!(cursor = key, value = %cursor.value, "cursor stored");
        Ok(cursor)
    }

    pub async fn record_products_page(&self, page: u32) -> Result<SyncCursor> {
        self.put(CURSOR_PRODUCTS_PAGE, json!({ "page": page })).await
    }

    pub async fn record_products_since(&self, since_ms: i64) -> Result<SyncCursor> {
        self.put(CURSOR_PRODUCTS_SINCE, json!({ "since_ms": since_ms })).await
    }

    pub async fn record_downstream_page(&self, page: u32) -> Result<SyncCursor> {
        self.put(CURSOR_DOWNSTREAM_PRODUCTS_PAGE, json!({ "page": page })).await
    }

    /// Last page stored under `key`, if it holds a `page` number.
    pub async fn page(&self, key: &str) -> Result<Option<u32>> {
        Ok(self
            .get(key)
            .await?
            .and_then(|value| cursor_number(&value, "page"))
            .and_then(|page| u32::try_from(page).ok()))
    }

    pub async fn since_ms(&self) -> Result<Option<i64>> {
        Ok(self.get(CURSOR_PRODUCTS_SINCE).await?.and_then(|value| cursor_number(&value, "since_ms")))
    }
}

impl std::fmt::Debug for CursorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorStore").finish_non_exhaustive()
    }
}
