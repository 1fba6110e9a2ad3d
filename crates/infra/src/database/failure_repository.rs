//! Durable failure storage keyed by `(context, ref_id)`
//!
//! The natural key is enforced by a unique index, so concurrent retries fold
//! into one row through `INSERT ... ON CONFLICT DO UPDATE`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use storesync_core::{FailureRepository, FailureUpsert};
use storesync_domain::{new_record_id, Failure, FailureContext, Result, StoreSyncError};

use super::codec::{
    enum_from_sql, json_from_sql, json_to_sql, opt_ts_from_sql, ts_from_sql, ts_to_sql,
    u32_from_sql, u64_from_i64, usize_to_i64,
};
use super::manager::DbManager;
use crate::errors::map_sql_error;

/// SQLite implementation of [`FailureRepository`].
pub struct SqliteFailureRepository {
    db: Arc<DbManager>,
}

impl SqliteFailureRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FailureRepository for SqliteFailureRepository {
    async fn upsert(&self, failure: &FailureUpsert) -> Result<Failure> {
        let failure = failure.clone();
        self.db
            .run_blocking(move |conn| {
                conn.query_row(
                    FAILURE_UPSERT_SQL,
                    params![
                        new_record_id(),
                        failure.context.as_str(),
                        ref_to_sql(failure.ref_id.as_deref()),
                        json_to_sql(&failure.payload)?,
                        failure.error,
                        ts_to_sql(failure.next_retry_at),
                        ts_to_sql(failure.now),
                    ],
                    map_failure_row,
                )
                .map_err(map_sql_error)
            })
            .await
    }

    async fn find(&self, context: FailureContext, ref_id: Option<&str>) -> Result<Option<Failure>> {
        let ref_id = ref_to_sql(ref_id).to_string();
        self.db
            .run_blocking(move |conn| {
                conn.query_row(FAILURE_BY_KEY_QUERY, params![context.as_str(), ref_id], map_failure_row)
                    .optional()
                    .map_err(map_sql_error)
            })
            .await
    }

    async fn due(&self, now: DateTime<Utc>, max_attempts: u32, limit: usize) -> Result<Vec<Failure>> {
        self.db
            .run_blocking(move |conn| {
                let mut stmt = conn.prepare(FAILURE_DUE_QUERY).map_err(map_sql_error)?;
                let rows = stmt
                    .query_map(
                        params![ts_to_sql(now), max_attempts, usize_to_i64(limit)],
                        map_failure_row,
                    )
                    .map_err(map_sql_error)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
            })
            .await
    }

    async fn reschedule(
        &self,
        id: &str,
        next_retry_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let id = id.to_string();
        self.db
            .run_blocking(move |conn| {
                let changed = conn
                    .execute(
                        FAILURE_RESCHEDULE_SQL,
                        params![id, ts_to_sql(next_retry_at), ts_to_sql(now)],
                    )
                    .map_err(map_sql_error)?;
                if changed == 0 {
                    return Err(StoreSyncError::NotFound(format!("failure {id}")));
                }
                Ok(())
            })
            .await
    }

    async fn count(&self) -> Result<u64> {
        self.db
            .run_blocking(|conn| {
                conn.query_row("SELECT COUNT(*) FROM failures", [], |row| row.get::<_, i64>(0))
                    .map(u64_from_i64)
                    .map_err(map_sql_error)
            })
            .await
    }
}

const FAILURE_UPSERT_SQL: &str = "INSERT INTO failures (
        id, context, ref_id, payload, last_error, attempts, next_retry_at, created_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?7)
    ON CONFLICT(context, ref_id) DO UPDATE SET
        payload = excluded.payload,
        last_error = excluded.last_error,
        next_retry_at = excluded.next_retry_at,
        attempts = failures.attempts + 1,
        updated_at = excluded.updated_at
    RETURNING id, context, ref_id, payload, last_error, attempts, next_retry_at,
        created_at, updated_at";

const FAILURE_BY_KEY_QUERY: &str = "SELECT id, context, ref_id, payload, last_error, attempts,
        next_retry_at, created_at, updated_at
    FROM failures WHERE context = ?1 AND ref_id = ?2";

// NULLs sort first under ASC.
const FAILURE_DUE_QUERY: &str = "SELECT id, context, ref_id, payload, last_error, attempts,
        next_retry_at, created_at, updated_at
    FROM failures
    WHERE (next_retry_at IS NULL OR next_retry_at <= ?1) AND attempts < ?2
    ORDER BY next_retry_at ASC, created_at ASC
    LIMIT ?3";

const FAILURE_RESCHEDULE_SQL: &str = "UPDATE failures
    SET next_retry_at = ?2, attempts = attempts + 1, updated_at = ?3
    WHERE id = ?1";

fn ref_to_sql(ref_id: Option<&str>) -> &str {
    ref_id.unwrap_or("")
}

fn map_failure_row(row: &Row<'_>) -> rusqlite::Result<Failure> {
    let context: String = row.get(1)?;
    let ref_id: String = row.get(2)?;
    let payload: String = row.get(3)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    Ok(Failure {
        id: row.get(0)?,
        context: enum_from_sql(1, &context)?,
        ref_id: (!ref_id.is_empty()).then_some(ref_id),
        payload: json_from_sql(3, &payload)?,
        last_error: row.get(4)?,
        attempts: u32_from_sql(5, row.get(5)?)?,
        next_retry_at: opt_ts_from_sql(6, row.get(6)?)?,
        created_at: ts_from_sql(7, &created_at)?,
        updated_at: ts_from_sql(8, &updated_at)?,
    })
}
