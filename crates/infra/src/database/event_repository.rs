//! Integration event timeline storage

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Row};
use storesync_core::EventRepository;
use storesync_domain::{IntegrationEvent, Result};

use super::codec::{enum_from_sql, json_from_sql, json_to_sql, ts_from_sql, ts_to_sql};
use super::manager::DbManager;
use crate::errors::map_sql_error;

pub struct SqliteEventRepository {
    db: Arc<DbManager>,
}

impl SqliteEventRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EventRepository for SqliteEventRepository {
    async fn append(&self, event: &IntegrationEvent) -> Result<()> {
        let event = event.clone();
        self.db
            .run_blocking(move |conn| {
                conn.execute(
                    EVENT_INSERT_SQL,
                    params![
                        event.id,
                        event.run_id,
                        event.event_type.as_str(),
                        event.ref_id,
                        json_to_sql(&event.payload)?,
                        event.level.as_str(),
                        ts_to_sql(event.created_at),
                    ],
                )
                .map_err(map_sql_error)?;
                Ok(())
            })
            .await
    }

    async fn list_for_run(&self, run_id: &str) -> Result<Vec<IntegrationEvent>> {
        let run_id = run_id.to_string();
        self.db
            .run_blocking(move |conn| {
                let mut stmt = conn.prepare(EVENTS_BY_RUN_QUERY).map_err(map_sql_error)?;
                let rows = stmt.query_map(params![run_id], map_event_row).map_err(map_sql_error)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
            })
            .await
    }
}

const EVENT_INSERT_SQL: &str = "INSERT INTO integration_events (
        id, run_id, event_type, ref_id, payload, level, created_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

const EVENTS_BY_RUN_QUERY: &str = "SELECT id, run_id, event_type, ref_id, payload, level, created_at
    FROM integration_events WHERE run_id = ?1 ORDER BY created_at, id";

fn map_event_row(row: &Row<'_>) -> rusqlite::Result<IntegrationEvent> {
    let event_type: String = row.get(2)?;
    let payload: String = row.get(4)?;
    let level: String = row.get(5)?;
    let created_at: String = row.get(6)?;

    Ok(IntegrationEvent {
        id: row.get(0)?,
        run_id: row.get(1)?,
        event_type: enum_from_sql(2, &event_type)?,
        ref_id: row.get(3)?,
        payload: json_from_sql(4, &payload)?,
        level: enum_from_sql(5, &level)?,
        created_at: ts_from_sql(6, &created_at)?,
    })
}
