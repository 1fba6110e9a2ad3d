//! Upstream (source-of-truth) platform client
//!
//! Vendor list payloads have the shape `{items: [...], ...meta}`. Products
//! and variants may carry their identifier as `_id` or `id`; a variant
//! without `price` is priced from `priceForResell`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use storesync_common::CircuitBreaker;
use storesync_core::{RequestAuditRepository, RequestContext, UpstreamApi};
use storesync_domain::{
    AttributeDto, CategoryDto, Driver, HttpConfig, OrderCreateDto, OrderDto,
    OrderSubmissionResult, Page, PageMeta, ProductDto, Result, StoreSyncError, UpstreamConfig,
    VariantDto,
};
use tracing::{debug, instrument};

use super::transport::{RetryingTransport, TransportRequest};

const PRODUCT_CANONICAL_KEYS: [&str; 5] = ["_id", "id", "title", "variants", "category_ids"];
const ORDER_CANONICAL_KEYS: [&str; 6] = ["_id", "type", "status", "items", "shipments", "address"];

pub struct UpstreamClient {
    transport: RetryingTransport,
}

impl UpstreamClient {
    pub fn new(transport: RetryingTransport) -> Self {
        Self { transport }
    }

    /// Client with bearer authentication and the shared breaker.
    pub fn from_config(
        config: &UpstreamConfig,
        http: &HttpConfig,
        audit: Arc<dyn RequestAuditRepository>,
        breaker: CircuitBreaker,
    ) -> Result<Self> {
        let mut builder = RetryingTransport::builder(Driver::Upstream, &config.base_url, audit)
            .http_config(http)
            .breaker(breaker)
            .default_header("Accept", "application/json");
        if let Some(token) = &config.token {
            builder = builder.default_header("Authorization", format!("Bearer {token}"));
        }
        Ok(Self::new(builder.build()?))
    }

    async fn fetch_list(
        &self,
        request: TransportRequest,
        ctx: &RequestContext,
    ) -> Result<(Vec<Value>, PageMeta)> {
        let response = self.transport.send(&request, ctx).await?;
        let payload = match response.json()? {
            Value::Object(map) => map,
            _ => return Err(invalid("list", "response must be an object")),
        };
        split_list(payload, &request.path)
    }
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient").field("transport", &self.transport).finish()
    }
}

#[async_trait]
impl UpstreamApi for UpstreamClient {
    #[instrument(skip(self, ctx))]
    async fn fetch_products(
        &self,
        page: u32,
        limit: u32,
        since_ms: i64,
        ctx: &RequestContext,
    ) -> Result<Page<ProductDto>> {
        let request = TransportRequest::get("products")
            .query("page", page)
            .query("limit", limit)
            .query("since", since_ms);
        let (items, meta) = self.fetch_list(request, ctx).await?;
        let products = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| normalize_product(index, item))
            .collect::<Result<Vec<_>>>()?;
        debug!(count = products.len(), "upstream products normalised");
        Ok(Page::new(products, meta))
    }

    async fn fetch_categories(
        &self,
        page: u32,
        limit: u32,
        ctx: &RequestContext,
    ) -> Result<Page<CategoryDto>> {
        let request = TransportRequest::get("categories").query("page", page).query("limit", limit);
        let (items, meta) = self.fetch_list(request, ctx).await?;
        let categories = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| normalize_category(index, item))
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(categories, meta))
    }

    async fn fetch_attributes(
        &self,
        page: u32,
        limit: u32,
        ctx: &RequestContext,
    ) -> Result<Page<AttributeDto>> {
        let request = TransportRequest::get("attributes").query("page", page).query("limit", limit);
        let (items, meta) = self.fetch_list(request, ctx).await?;
        let attributes = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| normalize_attribute(index, item))
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(attributes, meta))
    }

    async fn fetch_orders(
        &self,
        page: u32,
        limit: u32,
        ctx: &RequestContext,
    ) -> Result<Page<OrderDto>> {
        let request = TransportRequest::get("orders").query("page", page).query("limit", limit);
        let (items, meta) = self.fetch_list(request, ctx).await?;
        let orders = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| normalize_order(&format!("items.{index}"), item))
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(orders, meta))
    }

    #[instrument(skip(self, order, ctx))]
    async fn create_order(
        &self,
        order: &OrderCreateDto,
        ctx: &RequestContext,
    ) -> Result<OrderSubmissionResult> {
        order.validate()?;
        let body = serde_json::to_value(order).map_err(|err| {
            StoreSyncError::InvalidInput(format!("order draft could not be encoded: {err}"))
        })?;

        let mut request = TransportRequest::post("orders").json(body);
        let mut ctx = ctx.clone();
        if let Some(key) = &order.idempotency_key {
            request = request.header("Idempotency-Key", key.clone());
            ctx.idempotency_key = Some(key.clone());
        }

        let response = self.transport.send(&request, &ctx).await?;
        let mut payload = match response.json()? {
            Value::Object(map) => map,
            _ => return Err(invalid("order response", "response must be an object")),
        };

        let success = match payload.get("success") {
            Some(Value::Bool(flag)) => *flag,
            _ => return Err(invalid("order response", "success must be a boolean")),
        };
        let orders = match payload.remove("orders") {
            Some(Value::Array(orders)) => orders
                .into_iter()
                .enumerate()
                .map(|(index, item)| normalize_order(&format!("orders.{index}"), item))
                .collect::<Result<Vec<_>>>()?,
            None | Some(Value::Null) => Vec::new(),
            Some(_) => return Err(invalid("order response", "orders must be an array")),
        };

        Ok(OrderSubmissionResult {
            success,
            orders,
            payment_link: scalar_string(payload.get("paymentLink")),
            message: scalar_string(payload.get("message")),
        })
    }
}

fn invalid(subject: &str, reason: &str) -> StoreSyncError {
    StoreSyncError::InvalidInput(format!("invalid upstream {subject} payload: {reason}"))
}

fn split_list(mut payload: Map<String, Value>, subject: &str) -> Result<(Vec<Value>, PageMeta)> {
    let items = match payload.remove("items") {
        Some(Value::Array(items)) => items,
        Some(_) => return Err(invalid(subject, "items must be an array")),
        None => return Err(invalid(subject, "items is required")),
    };
    Ok((items, PageMeta(payload)))
}

/// Strings pass through, numbers are rendered; anything else is absent.
fn scalar_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn identifier(map: &Map<String, Value>) -> Option<String> {
    match map.get("_id") {
        Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
        Some(_) => None,
        None => scalar_string(map.get("id")),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(|item| scalar_string(Some(item))).collect(),
        _ => Vec::new(),
    }
}

fn into_object(value: Value, path: &str, subject: &str) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(invalid(subject, &format!("{path} must be an object"))),
    }
}

fn normalize_product(index: usize, value: Value) -> Result<ProductDto> {
    let path = format!("items.{index}");
    let map = into_object(value, &path, "product")?;
    let id = identifier(&map).ok_or_else(|| invalid("product", &format!("{path}._id is required")))?;

    let title = match map.get("title") {
        Some(Value::String(title)) => title.clone(),
        None | Some(Value::Null) => "unknown".to_string(),
        Some(_) => return Err(invalid("product", &format!("{path}.title must be a string"))),
    };

    let variants = match map.get("variants") {
        Some(Value::Array(variants)) => variants
            .iter()
            .enumerate()
            .map(|(position, variant)| normalize_variant(&format!("{path}.variants.{position}"), variant))
            .collect::<Result<Vec<_>>>()?,
        _ => return Err(invalid("product", &format!("{path}.variants is required"))),
    };

    let category_ids = match map.get("categories") {
        Some(Value::Array(categories)) => categories
            .iter()
            .filter_map(|category| category.as_object().and_then(|c| scalar_string(c.get("_id"))))
            .collect(),
        _ => Vec::new(),
    };

    let metadata = map
        .into_iter()
        .filter(|(key, _)| !PRODUCT_CANONICAL_KEYS.contains(&key.as_str()))
        .collect();

    Ok(ProductDto { id, title, variants, category_ids, metadata })
}

fn normalize_variant(path: &str, value: &Value) -> Result<VariantDto> {
    let map = value
        .as_object()
        .ok_or_else(|| invalid("product", &format!("{path} must be an object")))?;
    let id = identifier(map).ok_or_else(|| invalid("product", &format!("{path}._id is required")))?;

    let price_value = map.get("price").or_else(|| map.get("priceForResell"));
    let price = match price_value.and_then(numeric) {
        Some(price) if price >= 0.0 => price.trunc() as i64,
        Some(_) => return Err(invalid("product", &format!("{path}.price must be at least 0"))),
        None => return Err(invalid("product", &format!("{path}.price must be numeric"))),
    };

    let stock = match map.get("stock") {
        None | Some(Value::Null) => 0,
        Some(value) => integer(value)
            .ok_or_else(|| invalid("product", &format!("{path}.stock must be an integer")))?,
    };

    Ok(VariantDto { id, price, stock })
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn normalize_category(index: usize, value: Value) -> Result<CategoryDto> {
    let path = format!("items.{index}");
    let map = into_object(value, &path, "category")?;
    let id = identifier(&map).ok_or_else(|| invalid("category", &format!("{path}._id is required")))?;
    let name = match map.get("name") {
        Some(Value::String(name)) => name.clone(),
        _ => return Err(invalid("category", &format!("{path}.name is required"))),
    };
    Ok(CategoryDto {
        id,
        name,
        attribute_ids: string_list(map.get("attributeIds")),
        parent_id: scalar_string(map.get("parent")),
    })
}

fn normalize_attribute(index: usize, value: Value) -> Result<AttributeDto> {
    let path = format!("items.{index}");
    let map = into_object(value, &path, "attribute")?;
    let key = scalar_string(map.get("key"))
        .ok_or_else(|| invalid("attribute", &format!("{path}.key is required")))?;
    let name = scalar_string(map.get("name"))
        .ok_or_else(|| invalid("attribute", &format!("{path}.name is required")))?;
    Ok(AttributeDto { key, name, values: string_list(map.get("values")) })
}

fn normalize_order(path: &str, value: Value) -> Result<OrderDto> {
    let map = into_object(value, path, "order")?;
    let id = identifier(&map).ok_or_else(|| invalid("order", &format!("{path}._id is required")))?;

    let items = match map.get("items") {
        Some(Value::Array(items)) => items.clone(),
        None | Some(Value::Null) => Vec::new(),
        Some(_) => return Err(invalid("order", &format!("{path}.items must be an array"))),
    };
    for (position, item) in items.iter().enumerate() {
        let valid_variation = item.get("variation").and_then(|v| scalar_string(Some(v))).is_some();
        if !valid_variation {
            return Err(invalid("order", &format!("{path}.items.{position}.variation is required")));
        }
        if item.get("amount").and_then(integer).is_none() {
            return Err(invalid("order", &format!("{path}.items.{position}.amount must be an integer")));
        }
    }

    let shipments = match map.get("shipments") {
        Some(Value::Array(shipments)) => shipments.clone(),
        _ => Vec::new(),
    };

    let order_type = scalar_string(map.get("type"));
    let status = scalar_string(map.get("status"));
    let raw = Value::Object(
        map.into_iter().filter(|(key, _)| !ORDER_CANONICAL_KEYS.contains(&key.as_str())).collect(),
    );

    Ok(OrderDto { id, order_type, status, items, shipments, raw })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use storesync_common::BackoffPolicy;
    use storesync_domain::{OrderAddressDto, OrderItemDto};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::super::transport::test_support::RecordingAudit;
    use super::*;

    fn client(server: &MockServer, audit: &Arc<RecordingAudit>) -> UpstreamClient {
        let transport = RetryingTransport::builder(
            Driver::Upstream,
            &server.uri(),
            Arc::clone(audit) as Arc<dyn RequestAuditRepository>,
        )
        .backoff(BackoffPolicy::new(1, 5))
        .default_header("Authorization", "Bearer token-1")
        .build()
        .unwrap();
        UpstreamClient::new(transport)
    }

    fn draft() -> OrderCreateDto {
        OrderCreateDto {
            order_type: "retail".into(),
            items: vec![OrderItemDto { variation: "v1".into(), amount: 1, info: None }],
            address: OrderAddressDto {
                postal_code: "1234".into(),
                detail: "Street 1".into(),
                trans_feree: "Sam".into(),
                trans_feree_mobile: "09120000000".into(),
                city: "Tehran".into(),
                province: "Tehran".into(),
            },
            shipments: Vec::new(),
            idempotency_key: Some("order-key-1".into()),
        }
    }

    #[tokio::test]
    async fn products_are_normalised_onto_canonical_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .and(query_param("page", "1"))
            .and(query_param("limit", "25"))
            .and(query_param("since", "-120000"))
            .and(header("authorization", "Bearer token-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{
                    "id": 42,
                    "title": "Blue Mug",
                    "brand": "Acme",
                    "categories": [{ "_id": "c1" }, { "name": "no id" }],
                    "variants": [
                        { "_id": "v1", "price": 1000, "stock": 3 },
                        { "id": "v2", "priceForResell": "250.7" }
                    ]
                }],
                "page": 1,
                "pages_total": 4
            })))
            .mount(&server)
            .await;

        let audit = Arc::new(RecordingAudit::default());
        let page = client(&server, &audit)
            .fetch_products(1, 25, -120_000, &RequestContext::for_run("run-1"))
            .await
            .unwrap();

        let product = &page.items[0];
        assert_eq!(product.id, "42");
        assert_eq!(product.category_ids, vec!["c1".to_string()]);
        assert_eq!(product.metadata["brand"], "Acme");
        assert!(product.metadata.contains_key("categories"));
        assert!(!product.metadata.contains_key("variants"));
        assert_eq!(product.variants[0], VariantDto { id: "v1".into(), price: 1000, stock: 3 });
        assert_eq!(product.variants[1], VariantDto { id: "v2".into(), price: 250, stock: 0 });
        assert_eq!(page.meta.pages_total(), Some(4));
        assert!(!page.meta.0.contains_key("items"));

        let records = audit.records();
        assert_eq!(records[0].run_id.as_deref(), Some("run-1"));
        assert_eq!(records[0].request_headers.as_ref().unwrap()["authorization"], json!(["***"]));
    }

    #[tokio::test]
    async fn malformed_variants_are_local_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{ "_id": "p1", "variants": [{ "_id": "v1", "price": -5 }] }]
            })))
            .mount(&server)
            .await;

        let audit = Arc::new(RecordingAudit::default());
        let err = client(&server, &audit)
            .fetch_products(1, 25, 0, &RequestContext::default())
            .await
            .unwrap_err();

        assert!(matches!(err, StoreSyncError::InvalidInput(_)));
        assert!(err.to_string().contains("items.0.variants.0.price"), "{err}");
    }

    #[tokio::test]
    async fn taxonomy_lists_are_normalised() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/categories"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{ "_id": "c1", "name": "Kitchen", "attributeIds": [7, "color"], "parent": "c0" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/attributes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{ "key": "color", "name": "Color", "values": ["red", 2] }]
            })))
            .mount(&server)
            .await;

        let audit = Arc::new(RecordingAudit::default());
        let upstream = client(&server, &audit);
        let ctx = RequestContext::default();

        let categories = upstream.fetch_categories(1, 100, &ctx).await.unwrap();
        assert_eq!(categories.items[0].attribute_ids, vec!["7".to_string(), "color".to_string()]);
        assert_eq!(categories.items[0].parent_id.as_deref(), Some("c0"));

        let attributes = upstream.fetch_attributes(1, 100, &ctx).await.unwrap();
        assert_eq!(attributes.items[0].values, vec!["red".to_string(), "2".to_string()]);
    }

    #[tokio::test]
    async fn order_submission_sends_the_idempotency_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .and(header("idempotency-key", "order-key-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "orders": [{ "_id": "o1", "type": "retail", "status": "pending", "note": "x" }],
                "paymentLink": "https://pay.test/o1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let audit = Arc::new(RecordingAudit::default());
        let result = client(&server, &audit)
            .create_order(&draft(), &RequestContext::for_run("run-1"))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.orders[0].id, "o1");
        assert_eq!(result.orders[0].raw, json!({ "note": "x" }));
        assert_eq!(result.payment_link.as_deref(), Some("https://pay.test/o1"));

        let record = &audit.records()[0];
        assert_eq!(record.idempotency_key.as_deref(), Some("order-key-1"));
        let body = record.request_body.as_ref().unwrap()["raw"].as_str().unwrap().to_string();
        assert!(body.contains("\"transFereeMobile\":\"***\""), "{body}");
    }

    #[tokio::test]
    async fn invalid_drafts_never_reach_the_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let mut draft = draft();
        draft.items.clear();
        let audit = Arc::new(RecordingAudit::default());
        let err = client(&server, &audit)
            .create_order(&draft, &RequestContext::default())
            .await
            .unwrap_err();

        assert!(matches!(err, StoreSyncError::InvalidInput(_)));
        assert!(audit.records().is_empty());
    }

    #[tokio::test]
    async fn order_responses_without_success_flag_are_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "orders": [] })))
            .mount(&server)
            .await;

        let audit = Arc::new(RecordingAudit::default());
        let err = client(&server, &audit)
            .create_order(&draft(), &RequestContext::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("success"), "{err}");
    }
}
