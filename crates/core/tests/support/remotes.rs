//! Scripted fakes for the two remote platform ports

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use storesync_common::Clock;
use storesync_core::{DownstreamApi, RequestAuditRepository, RequestContext, UpstreamApi};
use storesync_domain::{
    new_record_id, AttributeDto, CategoryDto, Driver, ExternalRequestRecord, OrderCreateDto,
    OrderDto, OrderSubmissionResult, Page, PageMeta, PriceUpdate, ProductDto,
    RequestOutcome, Result as DomainResult, StockUpdate, StoreSyncError,
};

/// One call made against a fake, with the context it carried.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub operation: String,
    pub target: String,
    pub body: Value,
    pub ctx: RequestContext,
}

#[derive(Default)]
pub struct FakeUpstream {
    pub products: Mutex<Vec<ProductDto>>,
    pub categories: Mutex<Vec<CategoryDto>>,
    pub attributes: Mutex<Vec<AttributeDto>>,
    pub orders: Mutex<Vec<OrderDto>>,
    products_error: Mutex<Option<StoreSyncError>>,
    order_errors: Mutex<VecDeque<StoreSyncError>>,
    pub submitted: Mutex<Vec<(OrderCreateDto, RequestContext)>>,
}

impl FakeUpstream {
    pub fn set_products(&self, products: Vec<ProductDto>) {
        *self.products.lock().unwrap() = products;
    }

    pub fn fail_products_with(&self, err: StoreSyncError) {
        *self.products_error.lock().unwrap() = Some(err);
    }

    /// Next order submission answers with `err`.
    pub fn fail_next_order_with(&self, err: StoreSyncError) {
        self.order_errors.lock().unwrap().push_back(err);
    }
}

fn page_meta(page: u32, pages_total: u32) -> PageMeta {
    match json!({ "page": page, "pages_total": pages_total }) {
        Value::Object(map) => PageMeta(map),
        _ => PageMeta::default(),
    }
}

#[async_trait]
impl UpstreamApi for FakeUpstream {
    async fn fetch_products(
        &self,
        page: u32,
        _limit: u32,
        _since_ms: i64,
        _ctx: &RequestContext,
    ) -> DomainResult<Page<ProductDto>> {
        if let Some(err) = self.products_error.lock().unwrap().take() {
            return Err(err);
        }
        Ok(Page::new(self.products.lock().unwrap().clone(), page_meta(page, 1)))
    }

    async fn fetch_categories(
        &self,
        page: u32,
        _limit: u32,
        _ctx: &RequestContext,
    ) -> DomainResult<Page<CategoryDto>> {
        Ok(Page::new(self.categories.lock().unwrap().clone(), page_meta(page, 1)))
    }

    async fn fetch_attributes(
        &self,
        page: u32,
        _limit: u32,
        _ctx: &RequestContext,
    ) -> DomainResult<Page<AttributeDto>> {
        Ok(Page::new(self.attributes.lock().unwrap().clone(), page_meta(page, 1)))
    }

    async fn fetch_orders(
        &self,
        page: u32,
        _limit: u32,
        _ctx: &RequestContext,
    ) -> DomainResult<Page<OrderDto>> {
        Ok(Page::new(self.orders.lock().unwrap().clone(), page_meta(page, 1)))
    }

    async fn create_order(
        &self,
        order: &OrderCreateDto,
        ctx: &RequestContext,
    ) -> DomainResult<OrderSubmissionResult> {
        if let Some(err) = self.order_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        order.validate()?;
        self.submitted.lock().unwrap().push((order.clone(), ctx.clone()));
        Ok(OrderSubmissionResult {
            success: true,
            orders: vec![OrderDto {
                id: format!("order-{}", self.submitted.lock().unwrap().len()),
                order_type: Some(order.order_type.clone()),
                status: Some("pending".into()),
                items: Vec::new(),
                shipments: Vec::new(),
                raw: json!({}),
            }],
            payment_link: None,
            message: None,
        })
    }
}

/// Downstream fake. Scripted responses are consumed in order; once empty,
/// every call succeeds. Successful mutations are written to the request
/// audit the way the transport would.
pub struct FakeDownstream {
    responses: Mutex<VecDeque<DomainResult<Value>>>,
    catalogue: Mutex<Vec<Page<Value>>>,
    catalogue_error: Mutex<Option<StoreSyncError>>,
    calls: Mutex<Vec<RecordedCall>>,
    audit: Option<Arc<dyn RequestAuditRepository>>,
    clock: Option<Arc<dyn Clock>>,
}

impl Default for FakeDownstream {
    fn default() -> Self {
        Self {
            responses: Mutex::default(),
            catalogue: Mutex::default(),
            catalogue_error: Mutex::default(),
            calls: Mutex::default(),
            audit: None,
            clock: None,
        }
    }
}

impl FakeDownstream {
    pub fn auditing(audit: Arc<dyn RequestAuditRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { audit: Some(audit), clock: Some(clock), ..Self::default() }
    }

    pub fn respond_with(&self, response: DomainResult<Value>) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Catalogue pages served by `fetch_products`, page 1 first.
    pub fn set_catalogue(&self, pages: Vec<Page<Value>>) {
        *self.catalogue.lock().unwrap() = pages;
    }

    pub fn fail_catalogue_with(&self, err: StoreSyncError) {
        *self.catalogue_error.lock().unwrap() = Some(err);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, operation: &str) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|call| call.operation == operation).collect()
    }

    async fn respond(
        &self,
        operation: &str,
        target: &str,
        body: Value,
        ctx: &RequestContext,
    ) -> DomainResult<Value> {
        self.calls.lock().unwrap().push(RecordedCall {
            operation: operation.to_string(),
            target: target.to_string(),
            body,
            ctx: ctx.clone(),
        });

        let response = self.responses.lock().unwrap().pop_front().unwrap_or_else(|| Ok(json!({ "ok": true })));

        if let (Ok(_), Some(audit), Some(clock)) = (&response, &self.audit, &self.clock) {
            audit
                .record(&ExternalRequestRecord {
                    id: new_record_id(),
                    run_id: ctx.run_id.clone(),
                    driver: Driver::Downstream,
                    method: "PUT".into(),
                    url: format!("https://downstream.test/{target}"),
                    query: None,
                    request_headers: None,
                    request_body: None,
                    response_status: Some(200),
                    response_headers: None,
                    response_body: None,
                    duration_ms: Some(1),
                    attempt: 1,
                    outcome: RequestOutcome::Success,
                    idempotency_key: ctx.idempotency_key.clone(),
                    created_at: clock.now(),
                })
                .await?;
        }
        response
    }
}

#[async_trait]
impl DownstreamApi for FakeDownstream {
    async fn fetch_products(
        &self,
        page: u32,
        _page_size: u32,
        _ctx: &RequestContext,
    ) -> DomainResult<Page<Value>> {
        if let Some(err) = self.catalogue_error.lock().unwrap().take() {
            return Err(err);
        }
        let pages = self.catalogue.lock().unwrap();
        let index = usize::try_from(page.saturating_sub(1)).unwrap_or(usize::MAX);
        Ok(pages.get(index).cloned().unwrap_or_else(|| Page::new(Vec::new(), PageMeta::default())))
    }

    async fn update_price(&self, update: &PriceUpdate, ctx: &RequestContext) -> DomainResult<Value> {
        let body = json!({ "price": update.price });
        self.respond("update_price", &format!("accounting/update-price/{}", update.variant_id), body, ctx)
            .await
    }

    async fn update_stock(&self, update: &StockUpdate, ctx: &RequestContext) -> DomainResult<Value> {
        let body = json!({ "is_stock_manager": true, "stock_number": update.stock });
        self.respond("update_stock", &format!("accounting/update-stock/{}", update.variant_id), body, ctx)
            .await
    }

    async fn create_product(&self, payload: &Value, ctx: &RequestContext) -> DomainResult<Value> {
        self.respond("create_product", "products", payload.clone(), ctx).await
    }

    async fn update_product(
        &self,
        product_id: &str,
        payload: &Value,
        ctx: &RequestContext,
    ) -> DomainResult<Value> {
        self.respond("update_product", &format!("products/{product_id}"), payload.clone(), ctx).await
    }

    async fn create_order(&self, payload: &Value, ctx: &RequestContext) -> DomainResult<Value> {
        self.respond("create_order", "orders/create_order", payload.clone(), ctx).await
    }

    async fn update_order(
        &self,
        order_id: &str,
        payload: &Value,
        ctx: &RequestContext,
    ) -> DomainResult<Value> {
        self.respond("update_order", &format!("orders/{order_id}"), payload.clone(), ctx).await
    }

    async fn bulk_update_prices(&self, variants: &[Value], ctx: &RequestContext) -> DomainResult<Value> {
        self.respond("bulk_update_prices", "accounting/bulk-update-price", json!({ "variants": variants }), ctx)
            .await
    }

    async fn bulk_update_stock(&self, variants: &[Value], ctx: &RequestContext) -> DomainResult<Value> {
        self.respond("bulk_update_stock", "accounting/bulk-update-stock", json!({ "variants": variants }), ctx)
            .await
    }

    async fn update_by_sku(
        &self,
        sku: &str,
        payload: &Value,
        ctx: &RequestContext,
    ) -> DomainResult<Value> {
        self.respond("update_by_sku", &format!("accounting/update-by-sku/{sku}"), payload.clone(), ctx).await
    }
}
