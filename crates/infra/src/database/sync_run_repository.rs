//! SQLite storage for sync runs

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};
use serde_json::Value;
use storesync_core::SyncRunRepository;
use storesync_domain::{Result, StoreSyncError, SyncRun};

use super::codec::{
    enum_from_sql, json_from_sql, json_to_sql, opt_ts_from_sql, opt_ts_to_sql, opt_u32_from_sql,
    ts_from_sql, ts_to_sql, u32_from_sql,
};
use super::manager::DbManager;
use crate::errors::map_sql_error;

pub struct SqliteSyncRunRepository {
    db: Arc<DbManager>,
}

impl SqliteSyncRunRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SyncRunRepository for SqliteSyncRunRepository {
    async fn create(&self, run: &SyncRun) -> Result<()> {
        let run = run.clone();
        self.db
            .run_blocking(move |conn| {
                let totals = encode_totals(&run)?;
                conn.execute(
                    RUN_INSERT_SQL,
                    params![
                        run.id,
                        run.status.as_str(),
                        run.scope,
                        run.since_ms,
                        run.page,
                        run.pages_total,
                        totals,
                        run.error_message,
                        opt_ts_to_sql(run.started_at),
                        opt_ts_to_sql(run.finished_at),
                        ts_to_sql(run.created_at),
                    ],
                )
                .map_err(map_sql_error)?;
                Ok(())
            })
            .await
    }

    async fn update(&self, run: &SyncRun) -> Result<()> {
        let run = run.clone();
        self.db
            .run_blocking(move |conn| {
                let totals = encode_totals(&run)?;
                let changed = conn
                    .execute(
                        RUN_UPDATE_SQL,
                        params![
                            run.id,
                            run.status.as_str(),
                            run.since_ms,
                            run.page,
                            run.pages_total,
                            totals,
                            run.error_message,
                            opt_ts_to_sql(run.started_at),
                            opt_ts_to_sql(run.finished_at),
                        ],
                    )
                    .map_err(map_sql_error)?;
                if changed == 0 {
                    return Err(StoreSyncError::NotFound(format!("sync run {}", run.id)));
                }
                Ok(())
            })
            .await
    }

    async fn find(&self, id: &str) -> Result<Option<SyncRun>> {
        let id = id.to_string();
        self.db
            .run_blocking(move |conn| {
                conn.query_row(RUN_BY_ID_QUERY, params![id], map_run_row)
                    .optional()
                    .map_err(map_sql_error)
            })
            .await
    }

    async fn latest(&self) -> Result<Option<SyncRun>> {
        self.db
            .run_blocking(|conn| {
                conn.query_row(RUN_LATEST_QUERY, [], map_run_row).optional().map_err(map_sql_error)
            })
            .await
    }
}

const RUN_INSERT_SQL: &str = "INSERT INTO sync_runs (
        id, status, scope, since_ms, page, pages_total, totals, error_message,
        started_at, finished_at, created_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)";

const RUN_UPDATE_SQL: &str = "UPDATE sync_runs SET
        status = ?2, since_ms = ?3, page = ?4, pages_total = ?5, totals = ?6,
        error_message = ?7, started_at = ?8, finished_at = ?9
    WHERE id = ?1";

const RUN_BY_ID_QUERY: &str = "SELECT id, status, scope, since_ms, page, pages_total, totals,
        error_message, started_at, finished_at, created_at
    FROM sync_runs WHERE id = ?1";

const RUN_LATEST_QUERY: &str = "SELECT id, status, scope, since_ms, page, pages_total, totals,
        error_message, started_at, finished_at, created_at
    FROM sync_runs ORDER BY created_at DESC, id DESC LIMIT 1";

fn encode_totals(run: &SyncRun) -> Result<Option<String>> {
    run.totals.as_ref().map(|totals| json_to_sql(&Value::Object(totals.clone()))).transpose()
}

fn map_run_row(row: &Row<'_>) -> rusqlite::Result<SyncRun> {
    let status: String = row.get(1)?;
    let totals: Option<String> = row.get(6)?;
    let totals = match totals {
        Some(raw) => match json_from_sql(6, &raw)? {
            Value::Object(map) => Some(map),
            _ => None,
        },
        None => None,
    };
    let created_at: String = row.get(10)?;

    Ok(SyncRun {
        id: row.get(0)?,
        status: enum_from_sql(1, &status)?,
        scope: row.get(2)?,
        since_ms: row.get(3)?,
        page: u32_from_sql(4, row.get(4)?)?,
        pages_total: opt_u32_from_sql(5, row.get(5)?)?,
        totals,
        error_message: row.get(7)?,
        started_at: opt_ts_from_sql(8, row.get(8)?)?,
        finished_at: opt_ts_from_sql(9, row.get(9)?)?,
        created_at: ts_from_sql(10, &created_at)?,
    })
}
