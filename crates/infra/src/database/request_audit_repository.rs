//! Append-only SQLite storage for outbound request attempts

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Row};
use storesync_core::RequestAuditRepository;
use storesync_domain::{Driver, ExternalRequestRecord, RequestOutcome, Result};

use super::codec::{
    enum_from_sql, opt_json_from_sql, opt_json_to_sql, opt_u32_from_sql, ts_from_sql, ts_to_sql,
    u32_from_sql,
};
use super::manager::DbManager;
use crate::errors::map_sql_error;

/// SQLite implementation of [`RequestAuditRepository`].
pub struct SqliteRequestAuditRepository {
    db: Arc<DbManager>,
}

impl SqliteRequestAuditRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RequestAuditRepository for SqliteRequestAuditRepository {
    async fn record(&self, record: &ExternalRequestRecord) -> Result<()> {
        let record = record.clone();
        self.db
            .run_blocking(move |conn| {
                conn.execute(
                    REQUEST_INSERT_SQL,
                    params![
                        record.id,
                        record.run_id,
                        record.driver.as_str(),
                        record.method,
                        record.url,
                        opt_json_to_sql(record.query.as_ref())?,
                        opt_json_to_sql(record.request_headers.as_ref())?,
                        opt_json_to_sql(record.request_body.as_ref())?,
                        record.response_status,
                        opt_json_to_sql(record.response_headers.as_ref())?,
                        opt_json_to_sql(record.response_body.as_ref())?,
                        record.duration_ms,
                        record.attempt,
                        record.outcome.as_str(),
                        record.idempotency_key,
                        ts_to_sql(record.created_at),
                    ],
                )
                .map_err(map_sql_error)?;
                Ok(())
            })
            .await
    }

    async fn has_success(&self, driver: Driver, idempotency_key: &str) -> Result<bool> {
        let key = idempotency_key.to_string();
        self.db
            .run_blocking(move |conn| {
                conn.query_row(
                    REQUEST_SUCCESS_EXISTS_QUERY,
                    params![key, driver.as_str(), RequestOutcome::Success.as_str()],
                    |row| row.get::<_, bool>(0),
                )
                .map_err(map_sql_error)
            })
            .await
    }

    async fn find_by_idempotency_key(
        &self,
        idempotency_key: &str,
    ) -> Result<Vec<ExternalRequestRecord>> {
        let key = idempotency_key.to_string();
        self.db
            .run_blocking(move |conn| {
                let mut stmt = conn.prepare(REQUEST_BY_KEY_QUERY).map_err(map_sql_error)?;
                let rows = stmt.query_map(params![key], map_request_row).map_err(map_sql_error)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
            })
            .await
    }

    async fn list_for_run(&self, run_id: &str) -> Result<Vec<ExternalRequestRecord>> {
        let run_id = run_id.to_string();
        self.db
            .run_blocking(move |conn| {
                let mut stmt = conn.prepare(REQUEST_BY_RUN_QUERY).map_err(map_sql_error)?;
                let rows =
                    stmt.query_map(params![run_id], map_request_row).map_err(map_sql_error)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
            })
            .await
    }
}

const REQUEST_INSERT_SQL: &str = "INSERT INTO external_requests (
        id, run_id, driver, method, url, query, request_headers, request_body,
        response_status, response_headers, response_body, duration_ms, attempt,
        outcome, idempotency_key, created_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)";

const REQUEST_SUCCESS_EXISTS_QUERY: &str = "SELECT EXISTS(
        SELECT 1 FROM external_requests
        WHERE idempotency_key = ?1 AND driver = ?2 AND outcome = ?3
    )";

const REQUEST_BY_KEY_QUERY: &str = "SELECT id, run_id, driver, method, url, query,
        request_headers, request_body, response_status, response_headers, response_body,
        duration_ms, attempt, outcome, idempotency_key, created_at
    FROM external_requests WHERE idempotency_key = ?1 ORDER BY created_at, id";

const REQUEST_BY_RUN_QUERY: &str = "SELECT id, run_id, driver, method, url, query,
        request_headers, request_body, response_status, response_headers, response_body,
        duration_ms, attempt, outcome, idempotency_key, created_at
    FROM external_requests WHERE run_id = ?1 ORDER BY created_at, id";

fn map_request_row(row: &Row<'_>) -> rusqlite::Result<ExternalRequestRecord> {
    let driver: String = row.get(2)?;
    let status: Option<i64> = row.get(8)?;
    let outcome: String = row.get(13)?;
    let created_at: String = row.get(15)?;

    Ok(ExternalRequestRecord {
        id: row.get(0)?,
        run_id: row.get(1)?,
        driver: enum_from_sql(2, &driver)?,
        method: row.get(3)?,
        url: row.get(4)?,
        query: opt_json_from_sql(5, row.get(5)?)?,
        request_headers: opt_json_from_sql(6, row.get(6)?)?,
        request_body: opt_json_from_sql(7, row.get(7)?)?,
        response_status: opt_u32_from_sql(8, status)?.and_then(|code| u16::try_from(code).ok()),
        response_headers: opt_json_from_sql(9, row.get(9)?)?,
        response_body: opt_json_from_sql(10, row.get(10)?)?,
        duration_ms: row.get(11)?,
        attempt: u32_from_sql(12, row.get(12)?)?,
        outcome: enum_from_sql(13, &outcome)?,
        idempotency_key: row.get(14)?,
        created_at: ts_from_sql(15, &created_at)?,
    })
}
