//! Downstream catalogue projection tables

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};
use serde_json::Value;
use storesync_core::CatalogRepository;
use storesync_domain::{CatalogProduct, CatalogVariant, Result, StoreSyncError};

use super::codec::{json_from_sql, json_to_sql, ts_from_sql, ts_to_sql};
use super::manager::DbManager;
use crate::errors::map_sql_error;

pub struct SqliteCatalogRepository {
    db: Arc<DbManager>,
}

impl SqliteCatalogRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    async fn product_where(&self, sql: &'static str, value: String) -> Result<Option<CatalogProduct>> {
        self.db
            .run_blocking(move |conn| {
                conn.query_row(sql, params![value], map_product_row).optional().map_err(map_sql_error)
            })
            .await
    }

    async fn variant_where(&self, sql: &'static str, value: String) -> Result<Option<CatalogVariant>> {
        self.db
            .run_blocking(move |conn| {
                conn.query_row(sql, params![value], map_variant_row).optional().map_err(map_sql_error)
            })
            .await
    }
}

#[async_trait]
impl CatalogRepository for SqliteCatalogRepository {
    async fn find_product(&self, downstream_id: &str) -> Result<Option<CatalogProduct>> {
        self.product_where(PRODUCT_BY_ID_QUERY, downstream_id.to_string()).await
    }

    async fn upsert_product(&self, product: &CatalogProduct) -> Result<()> {
        let product = product.clone();
        self.db
            .run_blocking(move |conn| {
                conn.execute(
                    PRODUCT_UPSERT_SQL,
                    params![
                        product.downstream_id,
                        product.title,
                        product.title_normalized,
                        product.slug,
                        product.upstream_product_id,
                        json_to_sql(&product.raw_payload)?,
                        ts_to_sql(product.synced_at),
                    ],
                )
                .map_err(map_sql_error)?;
                Ok(())
            })
            .await
    }

    async fn find_product_by_upstream_id(&self, upstream_id: &str) -> Result<Option<CatalogProduct>> {
        self.product_where(PRODUCT_BY_UPSTREAM_QUERY, upstream_id.to_string()).await
    }

    async fn find_latest_product_by_title(
        &self,
        title_normalized: &str,
    ) -> Result<Option<CatalogProduct>> {
        self.product_where(PRODUCT_LATEST_BY_TITLE_QUERY, title_normalized.to_string()).await
    }

    async fn find_variant(&self, downstream_id: &str) -> Result<Option<CatalogVariant>> {
        self.variant_where(VARIANT_BY_ID_QUERY, downstream_id.to_string()).await
    }

    async fn upsert_variant(&self, variant: &CatalogVariant) -> Result<()> {
        let variant = variant.clone();
        self.db
            .run_blocking(move |conn| {
                let references = serde_json::to_string(&variant.external_references).map_err(|err| {
                    StoreSyncError::Internal(format!("failed to encode references: {err}"))
                })?;
                conn.execute(
                    VARIANT_UPSERT_SQL,
                    params![
                        variant.downstream_id,
                        variant.product_id,
                        variant.title,
                        variant.sku,
                        variant.upstream_variant_id,
                        references,
                        json_to_sql(&variant.raw_payload)?,
                        ts_to_sql(variant.synced_at),
                    ],
                )
                .map_err(map_sql_error)?;
                Ok(())
            })
            .await
    }

    async fn find_variant_by_upstream_id(
        &self,
        upstream_variant_id: &str,
    ) -> Result<Option<CatalogVariant>> {
        self.variant_where(VARIANT_BY_UPSTREAM_QUERY, upstream_variant_id.to_string()).await
    }
}

const PRODUCT_UPSERT_SQL: &str = "INSERT INTO catalog_products (
        downstream_id, title, title_normalized, slug, upstream_product_id, raw_payload, synced_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    ON CONFLICT(downstream_id) DO UPDATE SET
        title = excluded.title,
        title_normalized = excluded.title_normalized,
        slug = excluded.slug,
        upstream_product_id = excluded.upstream_product_id,
        raw_payload = excluded.raw_payload,
        synced_at = excluded.synced_at";

const PRODUCT_BY_ID_QUERY: &str = "SELECT downstream_id, title, title_normalized, slug,
        upstream_product_id, raw_payload, synced_at
    FROM catalog_products WHERE downstream_id = ?1";

const PRODUCT_BY_UPSTREAM_QUERY: &str = "SELECT downstream_id, title, title_normalized, slug,
        upstream_product_id, raw_payload, synced_at
    FROM catalog_products WHERE upstream_product_id = ?1
    ORDER BY synced_at DESC LIMIT 1";

const PRODUCT_LATEST_BY_TITLE_QUERY: &str = "SELECT downstream_id, title, title_normalized, slug,
        upstream_product_id, raw_payload, synced_at
    FROM catalog_products WHERE title_normalized = ?1
    ORDER BY synced_at DESC, downstream_id DESC LIMIT 1";

const VARIANT_UPSERT_SQL: &str = "INSERT INTO catalog_variants (
        downstream_id, product_id, title, sku, upstream_variant_id, external_references,
        raw_payload, synced_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    ON CONFLICT(downstream_id) DO UPDATE SET
        product_id = excluded.product_id,
        title = excluded.title,
        sku = excluded.sku,
        upstream_variant_id = excluded.upstream_variant_id,
        external_references = excluded.external_references,
        raw_payload = excluded.raw_payload,
        synced_at = excluded.synced_at";

const VARIANT_BY_ID_QUERY: &str = "SELECT downstream_id, product_id, title, sku,
        upstream_variant_id, external_references, raw_payload, synced_at
    FROM catalog_variants WHERE downstream_id = ?1";

const VARIANT_BY_UPSTREAM_QUERY: &str = "SELECT downstream_id, product_id, title, sku,
        upstream_variant_id, external_references, raw_payload, synced_at
    FROM catalog_variants WHERE upstream_variant_id = ?1
    ORDER BY synced_at DESC LIMIT 1";

fn map_product_row(row: &Row<'_>) -> rusqlite::Result<CatalogProduct> {
    let raw_payload: String = row.get(5)?;
    let synced_at: String = row.get(6)?;
    Ok(CatalogProduct {
        downstream_id: row.get(0)?,
        title: row.get(1)?,
        title_normalized: row.get(2)?,
        slug: row.get(3)?,
        upstream_product_id: row.get(4)?,
        raw_payload: json_from_sql(5, &raw_payload)?,
        synced_at: ts_from_sql(6, &synced_at)?,
    })
}

fn map_variant_row(row: &Row<'_>) -> rusqlite::Result<CatalogVariant> {
    let references: String = row.get(5)?;
    let raw_payload: String = row.get(6)?;
    let synced_at: String = row.get(7)?;

    let external_references = match json_from_sql(5, &references)? {
        Value::Array(items) => {
            items.into_iter().filter_map(|item| item.as_str().map(str::to_string)).collect()
        }
        _ => Vec::new(),
    };

    Ok(CatalogVariant {
        downstream_id: row.get(0)?,
        product_id: row.get(1)?,
        title: row.get(2)?,
        sku: row.get(3)?,
        upstream_variant_id: row.get(4)?,
        external_references,
        raw_payload: json_from_sql(6, &raw_payload)?,
        synced_at: ts_from_sql(7, &synced_at)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn repository() -> (SqliteCatalogRepository, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = DbManager::new(dir.path().join("catalog.db"), 2).unwrap();
        db.run_migrations().unwrap();
        (SqliteCatalogRepository::new(Arc::new(db)), dir)
    }

    fn product(id: &str, title: &str, synced_at: chrono::DateTime<Utc>) -> CatalogProduct {
        CatalogProduct {
            downstream_id: id.into(),
            title: Some(title.into()),
            title_normalized: Some(title.to_lowercase()),
            slug: None,
            upstream_product_id: None,
            raw_payload: json!({ "id": id }),
            synced_at,
        }
    }

    #[tokio::test]
    async fn title_lookup_prefers_most_recent_sync() {
        let (repo, _dir) = repository();
        let now = Utc::now();
        repo.upsert_product(&product("dp-old", "Blue Mug", now - Duration::hours(1))).await.unwrap();
        repo.upsert_product(&product("dp-new", "Blue Mug", now)).await.unwrap();
        repo.upsert_product(&product("dp-other", "Red Mug", now)).await.unwrap();

        let found = repo.find_latest_product_by_title("blue mug").await.unwrap().unwrap();
        assert_eq!(found.downstream_id, "dp-new");
        assert!(repo.find_latest_product_by_title("green mug").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn variant_upsert_overwrites_and_indexes_upstream_id() {
        let (repo, _dir) = repository();
        let now = Utc::now();
        let mut variant = CatalogVariant {
            downstream_id: "sv1".into(),
            product_id: "dp1".into(),
            title: None,
            sku: Some("SKU-1".into()),
            upstream_variant_id: None,
            external_references: Vec::new(),
            raw_payload: json!({ "id": "sv1" }),
            synced_at: now,
        };
        repo.upsert_variant(&variant).await.unwrap();
        assert!(repo.find_variant_by_upstream_id("v1").await.unwrap().is_none());

        variant.upstream_variant_id = Some("v1".into());
        variant.external_references = vec!["v1".into(), "legacy-7".into()];
        repo.upsert_variant(&variant).await.unwrap();

        let stored = repo.find_variant_by_upstream_id("v1").await.unwrap().unwrap();
        assert_eq!(stored.downstream_id, "sv1");
        assert_eq!(stored.external_references, vec!["v1".to_string(), "legacy-7".to_string()]);
        assert_eq!(repo.find_variant("sv1").await.unwrap().unwrap().sku.as_deref(), Some("SKU-1"));
    }

    #[tokio::test]
    async fn product_lookup_by_upstream_id() {
        let (repo, _dir) = repository();
        let mut mapped = product("dp1", "Blue Mug", Utc::now());
        mapped.upstream_product_id = Some("p1".into());
        repo.upsert_product(&mapped).await.unwrap();

        assert_eq!(repo.find_product_by_upstream_id("p1").await.unwrap().unwrap().downstream_id, "dp1");
        assert_eq!(repo.find_product("dp1").await.unwrap().unwrap().title.as_deref(), Some("Blue Mug"));
    }
}
