//! Port interfaces for the two remote platforms
//!
//! Adapters normalise vendor payloads onto the domain DTOs before returning,
//! so nothing behind these traits sees vendor field names except the
//! downstream catalogue rows, which the reconciler inspects as raw JSON.

use async_trait::async_trait;
use serde_json::Value;
use storesync_domain::{
    AttributeDto, CategoryDto, OrderCreateDto, OrderDto, OrderSubmissionResult, Page, PriceUpdate,
    ProductDto, Result, StockUpdate,
};

/// Per-call metadata threaded through to the request audit log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub run_id: Option<String>,
    pub idempotency_key: Option<String>,
}

impl RequestContext {
    pub fn for_run(run_id: impl Into<String>) -> Self {
        Self { run_id: Some(run_id.into()), idempotency_key: None }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Source-of-truth platform: products, taxonomy and orders.
#[async_trait]
pub trait UpstreamApi: Send + Sync {
    async fn fetch_products(
        &self,
        page: u32,
        limit: u32,
        since_ms: i64,
        ctx: &RequestContext,
    ) -> Result<Page<ProductDto>>;

    async fn fetch_categories(
        &self,
        page: u32,
        limit: u32,
        ctx: &RequestContext,
    ) -> Result<Page<CategoryDto>>;

    async fn fetch_attributes(
        &self,
        page: u32,
        limit: u32,
        ctx: &RequestContext,
    ) -> Result<Page<AttributeDto>>;

    async fn fetch_orders(&self, page: u32, limit: u32, ctx: &RequestContext)
        -> Result<Page<OrderDto>>;

    /// Submit an order draft; `order.idempotency_key` travels as a header.
    async fn create_order(
        &self,
        order: &OrderCreateDto,
        ctx: &RequestContext,
    ) -> Result<OrderSubmissionResult>;
}

/// Storefront platform receiving catalogue and order mutations.
///
/// A 409 answer is returned as `Ok` with the response body; any other status
/// of 400 or above is a [`StoreSyncError::Remote`](storesync_domain::StoreSyncError).
#[async_trait]
pub trait DownstreamApi: Send + Sync {
    /// Raw catalogue rows for one page, normalised from whichever list key
    /// the vendor used.
    async fn fetch_products(
        &self,
        page: u32,
        page_size: u32,
        ctx: &RequestContext,
    ) -> Result<Page<Value>>;

    async fn update_price(&self, update: &PriceUpdate, ctx: &RequestContext) -> Result<Value>;

    async fn update_stock(&self, update: &StockUpdate, ctx: &RequestContext) -> Result<Value>;

    async fn create_product(&self, payload: &Value, ctx: &RequestContext) -> Result<Value>;

    async fn update_product(
        &self,
        product_id: &str,
        payload: &Value,
        ctx: &RequestContext,
    ) -> Result<Value>;

    async fn create_order(&self, payload: &Value, ctx: &RequestContext) -> Result<Value>;

    async fn update_order(
        &self,
        order_id: &str,
        payload: &Value,
        ctx: &RequestContext,
    ) -> Result<Value>;

    async fn bulk_update_prices(&self, variants: &[Value], ctx: &RequestContext) -> Result<Value>;

    async fn bulk_update_stock(&self, variants: &[Value], ctx: &RequestContext) -> Result<Value>;

    async fn update_by_sku(&self, sku: &str, payload: &Value, ctx: &RequestContext)
        -> Result<Value>;
}
