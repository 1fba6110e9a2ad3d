//! Port interface for the downstream-local catalogue tables

use async_trait::async_trait;
use storesync_domain::{CatalogProduct, CatalogVariant, Result};

/// Trait for the downstream catalogue projection
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn find_product(&self, downstream_id: &str) -> Result<Option<CatalogProduct>>;

    /// Insert or overwrite the row keyed by `product.downstream_id`.
    async fn upsert_product(&self, product: &CatalogProduct) -> Result<()>;

    async fn find_product_by_upstream_id(&self, upstream_id: &str)
        -> Result<Option<CatalogProduct>>;

    /// Most recently synced product with this normalised title.
    async fn find_latest_product_by_title(
        &self,
        title_normalized: &str,
    ) -> Result<Option<CatalogProduct>>;

    async fn find_variant(&self, downstream_id: &str) -> Result<Option<CatalogVariant>>;

    /// Insert or overwrite the row keyed by `variant.downstream_id`.
    async fn upsert_variant(&self, variant: &CatalogVariant) -> Result<()>;

    async fn find_variant_by_upstream_id(
        &self,
        upstream_variant_id: &str,
    ) -> Result<Option<CatalogVariant>>;
}
