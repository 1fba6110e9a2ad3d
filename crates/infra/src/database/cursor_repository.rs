//! Incremental cursor storage

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};
use storesync_core::CursorRepository;
use storesync_domain::{Result, SyncCursor};

use super::codec::{json_from_sql, json_to_sql, ts_from_sql, ts_to_sql};
use super::manager::DbManager;
use crate::errors::map_sql_error;

pub struct SqliteCursorRepository {
    db: Arc<DbManager>,
}

impl SqliteCursorRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CursorRepository for SqliteCursorRepository {
    async fn get(&self, key: &str) -> Result<Option<SyncCursor>> {
        let key = key.to_string();
        self.db
            .run_blocking(move |conn| {
                conn.query_row(CURSOR_BY_KEY_QUERY, params![key], map_cursor_row)
                    .optional()
                    .map_err(map_sql_error)
            })
            .await
    }

    async fn upsert(&self, cursor: &SyncCursor) -> Result<()> {
        let cursor = cursor.clone();
        self.db
            .run_blocking(move |conn| {
                conn.execute(
                    CURSOR_UPSERT_SQL,
                    params![cursor.key, json_to_sql(&cursor.value)?, ts_to_sql(cursor.updated_at)],
                )
                .map_err(map_sql_error)?;
                Ok(())
            })
            .await
    }

    async fn list(&self) -> Result<Vec<SyncCursor>> {
        self.db
            .run_blocking(|conn| {
                let mut stmt = conn.prepare(CURSOR_LIST_QUERY).map_err(map_sql_error)?;
                let rows = stmt.query_map([], map_cursor_row).map_err(map_sql_error)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
            })
            .await
    }
}

const CURSOR_UPSERT_SQL: &str = "INSERT INTO sync_cursors (key, value, updated_at)
    VALUES (?1, ?2, ?3)
    ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";

const CURSOR_BY_KEY_QUERY: &str = "SELECT key, value, updated_at FROM sync_cursors WHERE key = ?1";

const CURSOR_LIST_QUERY: &str = "SELECT key, value, updated_at FROM sync_cursors ORDER BY key";

fn map_cursor_row(row: &Row<'_>) -> rusqlite::Result<SyncCursor> {
    let value: String = row.get(1)?;
    let updated_at: String = row.get(2)?;
    Ok(SyncCursor {
        key: row.get(0)?,
        value: json_from_sql(1, &value)?,
        updated_at: ts_from_sql(2, &updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn upsert_overwrites_the_single_row_per_key() {
        let dir = TempDir::new().unwrap();
        let db = DbManager::new(dir.path().join("cursors.db"), 2).unwrap();
        db.run_migrations().unwrap();
        let repo = SqliteCursorRepository::new(Arc::new(db));

        let now = Utc::now();
        repo.upsert(&SyncCursor { key: "products.page".into(), value: json!({ "page": 1 }), updated_at: now })
            .await
            .unwrap();
        repo.upsert(&SyncCursor { key: "products.page".into(), value: json!({ "page": 4 }), updated_at: now })
            .await
            .unwrap();
        repo.upsert(&SyncCursor {
            key: "products.since".into(),
            value: json!({ "since_ms": -120_000 }),
            updated_at: now,
        })
        .await
        .unwrap();

        let page = repo.get("products.page").await.unwrap().unwrap();
        assert_eq!(page.value, json!({ "page": 4 }));
        assert_eq!(repo.list().await.unwrap().len(), 2);
        assert!(repo.get("downstream.products.page").await.unwrap().is_none());
    }
}
