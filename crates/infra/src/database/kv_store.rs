//! SQLite-backed [`KeyValueStore`] so breaker and rate-limit state is shared
//! by every process pointed at the same database file.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use storesync_common::{Clock, KeyValueStore, KvError, KvResult, SystemClock};
use storesync_domain::StoreSyncError;

use super::manager::DbManager;
use crate::errors::map_sql_error;

pub struct SqliteKeyValueStore {
    db: Arc<DbManager>,
    clock: Arc<dyn Clock>,
}

impl SqliteKeyValueStore {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Arc<DbManager>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    fn now_ms(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }

    fn expiry_ms(&self, ttl: Option<Duration>) -> Option<i64> {
        let ttl = chrono::Duration::from_std(ttl?).ok()?;
        self.clock.now().checked_add_signed(ttl).map(|at: DateTime<Utc>| at.timestamp_millis())
    }
}

fn backend(err: StoreSyncError) -> KvError {
    KvError::Backend(err.to_string())
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let key = key.to_string();
        let now = self.now_ms();
        self.db
            .run_blocking(move |conn| {
                conn.query_row(KV_GET_QUERY, params![key, now], |row| row.get::<_, String>(0))
                    .optional()
                    .map_err(map_sql_error)
            })
            .await
            .map_err(backend)
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> KvResult<()> {
        let key = key.to_string();
        let value = value.to_string();
        let expires_at = self.expiry_ms(ttl);
        self.db
            .run_blocking(move |conn| {
                conn.execute(KV_PUT_SQL, params![key, value, expires_at]).map_err(map_sql_error)?;
                Ok(())
            })
            .await
            .map_err(backend)
    }

    async fn increment(&self, key: &str, ttl: Duration) -> KvResult<u64> {
        let owned_key = key.to_string();
        let now = self.now_ms();
        let expires_at = self.expiry_ms(Some(ttl));
        let updated = self
            .db
            .run_blocking(move |conn| {
                conn.query_row(KV_INCREMENT_SQL, params![owned_key, expires_at, now], |row| {
                    row.get::<_, String>(0)
                })
                .optional()
                .map_err(map_sql_error)
            })
            .await
            .map_err(backend)?;

        // No row back means the conflict guard refused a non-numeric value.
        let raw = updated.ok_or_else(|| KvError::NotACounter { key: key.to_string() })?;
        raw.trim().parse().map_err(|_| KvError::NotACounter { key: key.to_string() })
    }

    async fn forget(&self, key: &str) -> KvResult<()> {
        let key = key.to_string();
        self.db
            .run_blocking(move |conn| {
                conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])
                    .map_err(map_sql_error)?;
                Ok(())
            })
            .await
            .map_err(backend)
    }
}

const KV_GET_QUERY: &str = "SELECT value FROM kv_store
    WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)";

const KV_PUT_SQL: &str = "INSERT INTO kv_store (key, value, expires_at) VALUES (?1, ?2, ?3)
    ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at";

// Single statement so concurrent writers serialise on the SQLite write lock.
const KV_INCREMENT_SQL: &str = "INSERT INTO kv_store (key, value, expires_at) VALUES (?1, '1', ?2)
    ON CONFLICT(key) DO UPDATE SET
        value = CASE
            WHEN kv_store.expires_at IS NOT NULL AND kv_store.expires_at <= ?3 THEN '1'
            ELSE CAST(CAST(kv_store.value AS INTEGER) + 1 AS TEXT)
        END,
        expires_at = excluded.expires_at
    WHERE (kv_store.expires_at IS NOT NULL AND kv_store.expires_at <= ?3)
        OR (trim(kv_store.value) <> '' AND trim(kv_store.value) NOT GLOB '*[^0-9]*')
    RETURNING value";
