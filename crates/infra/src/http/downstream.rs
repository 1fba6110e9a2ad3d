//! Downstream storefront client

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use storesync_common::CircuitBreaker;
use storesync_core::{DownstreamApi, RequestAuditRepository, RequestContext};
use storesync_domain::{
    DownstreamConfig, Driver, HttpConfig, Page, PageMeta, PriceUpdate, Result, StockUpdate,
};
use tracing::instrument;

use super::transport::{RetryingTransport, TransportRequest, TransportResponse};

/// Keys the vendor has used for the product list, in lookup order.
const PRODUCT_LIST_KEYS: [&str; 3] = ["products", "items", "data"];

pub struct DownstreamClient {
    transport: RetryingTransport,
}

impl DownstreamClient {
    pub fn new(transport: RetryingTransport) -> Self {
        Self { transport }
    }

    /// Client authenticated with `X-API-KEY` and gated by the shared breaker.
    pub fn from_config(
        config: &DownstreamConfig,
        http: &HttpConfig,
        audit: Arc<dyn RequestAuditRepository>,
        breaker: CircuitBreaker,
    ) -> Result<Self> {
        let mut builder = RetryingTransport::builder(Driver::Downstream, &config.base_url, audit)
            .http_config(http)
            .breaker(breaker)
            .default_header("Accept", "application/json");
        if let Some(key) = &config.api_key {
            builder = builder.default_header("X-API-KEY", key.clone());
        }
        Ok(Self::new(builder.build()?))
    }

    async fn send(&self, request: TransportRequest, ctx: &RequestContext) -> Result<Value> {
        let response = self.transport.send(&request, ctx).await?;
        Ok(decode_body(&response))
    }
}

impl std::fmt::Debug for DownstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownstreamClient").field("transport", &self.transport).finish()
    }
}

/// Object bodies pass through; anything else reads as an empty object.
fn decode_body(response: &TransportResponse) -> Value {
    match response.json() {
        Ok(value @ Value::Object(_)) => value,
        _ => Value::Object(Map::new()),
    }
}

fn price_body(update: &PriceUpdate) -> Value {
    let mut body = Map::new();
    body.insert("price".into(), json!(update.price));
    if let Some(has_raw_price) = update.has_raw_price {
        body.insert("has_raw_price".into(), json!(has_raw_price));
    }
    if let Some(discount) = update.discount_price {
        body.insert("discount_price".into(), json!(discount));
    }
    Value::Object(body)
}

fn stock_body(update: &StockUpdate) -> Value {
    let mut body = Map::new();
    body.insert("is_stock_manager".into(), json!(true));
    body.insert("stock_number".into(), json!(update.stock));
    if update.is_relative {
        body.insert("is_relative".into(), json!(true));
    }
    Value::Object(body)
}

/// Split a catalogue page into rows and pagination metadata.
fn product_page(payload: Value) -> Page<Value> {
    let mut map = match payload {
        Value::Object(map) => map,
        _ => return Page::new(Vec::new(), PageMeta::default()),
    };

    let list_key = PRODUCT_LIST_KEYS.iter().find(|key| matches!(map.get(**key), Some(Value::Array(_))));
    let items = match list_key.and_then(|key| map.remove(*key)) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };

    let meta = match map.remove("meta") {
        Some(Value::Object(meta)) => meta,
        _ => map,
    };
    Page::new(items, PageMeta(meta))
}

#[async_trait]
impl DownstreamApi for DownstreamClient {
    async fn fetch_products(
        &self,
        page: u32,
        page_size: u32,
        ctx: &RequestContext,
    ) -> Result<Page<Value>> {
        let request =
            TransportRequest::get("products").query("page", page).query("page_size", page_size);
        let payload = self.send(request, ctx).await?;
        Ok(product_page(payload))
    }

    #[instrument(skip(self, update, ctx), fields(variant_id = %update.variant_id))]
    async fn update_price(&self, update: &PriceUpdate, ctx: &RequestContext) -> Result<Value> {
        let request = TransportRequest::put(format!("accounting/update-price/{}", update.variant_id))
            .json(price_body(update));
        self.send(request, ctx).await
    }

    #[instrument(skip(self, update, ctx), fields(variant_id = %update.variant_id))]
    async fn update_stock(&self, update: &StockUpdate, ctx: &RequestContext) -> Result<Value> {
        let request = TransportRequest::put(format!("accounting/update-stock/{}", update.variant_id))
            .json(stock_body(update));
        self.send(request, ctx).await
    }

    async fn create_product(&self, payload: &Value, ctx: &RequestContext) -> Result<Value> {
        self.send(TransportRequest::post("products").json(payload.clone()), ctx).await
    }

    async fn update_product(
        &self,
        product_id: &str,
        payload: &Value,
        ctx: &RequestContext,
    ) -> Result<Value> {
        let request = TransportRequest::put(format!("products/{product_id}")).json(payload.clone());
        self.send(request, ctx).await
    }

    async fn create_order(&self, payload: &Value, ctx: &RequestContext) -> Result<Value> {
        self.send(TransportRequest::post("orders/create_order").json(payload.clone()), ctx).await
    }

    async fn update_order(
        &self,
        order_id: &str,
        payload: &Value,
        ctx: &RequestContext,
    ) -> Result<Value> {
        let request = TransportRequest::put(format!("orders/{order_id}")).json(payload.clone());
        self.send(request, ctx).await
    }

    async fn bulk_update_prices(&self, variants: &[Value], ctx: &RequestContext) -> Result<Value> {
        let request = TransportRequest::put("accounting/bulk-update-price")
            .json(json!({ "variants": variants }));
        self.send(request, ctx).await
    }

    async fn bulk_update_stock(&self, variants: &[Value], ctx: &RequestContext) -> Result<Value> {
        let request = TransportRequest::put("accounting/bulk-update-stock")
            .json(json!({ "variants": variants }));
        self.send(request, ctx).await
    }

    async fn update_by_sku(&self, sku: &str, payload: &Value, ctx: &RequestContext) -> Result<Value> {
        let request = TransportRequest::put(format!("accounting/update-by-sku/{sku}")).json(payload.clone());
        self.send(request, ctx).await
    }
}
