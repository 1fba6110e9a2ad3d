//! Direct downstream write operations
//!
//! Each call records one timeline event: `info` on success, `error` with the
//! remote status and body on failure, after which the error is returned.

use std::str::FromStr;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use storesync_domain::{EventType, Result, StoreSyncError};
use tracing::instrument;

use crate::audit::EventRecorder;
use crate::remote_ports::{DownstreamApi, RequestContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderOperation {
    Create,
    Update,
}

impl OrderOperation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
        }
    }
}

impl FromStr for OrderOperation {
    type Err = StoreSyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            _ => Err(StoreSyncError::InvalidInput(
                "operation must be \"create\" or \"update\"".into(),
            )),
        }
    }
}

#[derive(Clone)]
pub struct CatalogueWriter {
    downstream: Arc<dyn DownstreamApi>,
    events: EventRecorder,
}

impl CatalogueWriter {
    pub fn new(downstream: Arc<dyn DownstreamApi>, events: EventRecorder) -> Self {
        Self { downstream, events }
    }

    /// Create a product when `product_id` is `None`, update it otherwise.
    #[instrument(skip(self, payload))]
    pub async fn upsert_product(
        &self,
        run_id: &str,
        payload: &Value,
        product_id: Option<&str>,
    ) -> Result<Value> {
        let ctx = RequestContext::for_run(run_id);
        let mode = if product_id.is_some() { "update" } else { "create" };
        let mut context = Map::new();
        context.insert("mode".into(), json!(mode));
        context.insert("payload_keys".into(), json!(payload_keys(payload)));

        let result = match product_id {
            Some(id) => self.downstream.update_product(id, payload, &ctx).await,
            None => self.downstream.create_product(payload, &ctx).await,
        };

        match result {
            Ok(response) => {
                let ref_id = product_id
                    .map(str::to_string)
                    .or_else(|| scalar_at(&response, "/product/id"));
                context.insert("product_id".into(), json!(ref_id));
                self.events
                    .info(run_id, EventType::ProductUpserted, Value::Object(context), ref_id.as_deref())
                    .await?;
                Ok(response)
            }
            Err(err) => {
                context.insert("product_id".into(), json!(product_id));
                self.fail(run_id, EventType::ProductUpserted, context, product_id, err).await
            }
        }
    }

    #[instrument(skip(self, payload))]
    pub async fn propagate_order(
        &self,
        run_id: &str,
        operation: OrderOperation,
        payload: &Value,
        order_id: Option<&str>,
    ) -> Result<Value> {
        let order_id = order_id.filter(|id| !id.is_empty());
        if operation == OrderOperation::Update && order_id.is_none() {
            return Err(StoreSyncError::InvalidInput(
                "order id is required when updating orders".into(),
            ));
        }

        let ctx = RequestContext::for_run(run_id);
        let mut context = Map::new();
        context.insert("operation".into(), json!(operation.as_str()));
        context.insert("order_identifier".into(), payload.get("order_identifier").cloned().unwrap_or(Value::Null));

        let result = match (operation, order_id) {
            (OrderOperation::Update, Some(id)) => self.downstream.update_order(id, payload, &ctx).await,
            _ => self.downstream.create_order(payload, &ctx).await,
        };

        match result {
            Ok(response) => {
                let resolved = match operation {
                    OrderOperation::Create => scalar_at(&response, "/order/id"),
                    OrderOperation::Update => order_id.map(str::to_string),
                };
                context.insert("order_id".into(), json!(resolved));
                self.events
                    .info(run_id, EventType::OrderPropagated, Value::Object(context), resolved.as_deref())
                    .await?;
                Ok(response)
            }
            Err(err) => {
                context.insert("order_id".into(), json!(order_id));
                self.fail(run_id, EventType::OrderPropagated, context, order_id, err).await
            }
        }
    }

    /// Items are `{id, price}` objects.
    pub async fn bulk_update_prices(&self, run_id: &str, variants: &[Value]) -> Result<Value> {
        let ctx = RequestContext::for_run(run_id);
        let result = self.downstream.bulk_update_prices(variants, &ctx).await;
        self.finish_bulk(run_id, bulk_context("price", variants), result).await
    }

    /// Items are `{id, stock}` objects.
    pub async fn bulk_update_stock(&self, run_id: &str, variants: &[Value]) -> Result<Value> {
        let ctx = RequestContext::for_run(run_id);
        let result = self.downstream.bulk_update_stock(variants, &ctx).await;
        self.finish_bulk(run_id, bulk_context("stock", variants), result).await
    }

    pub async fn update_by_sku(&self, run_id: &str, sku: &str, payload: &Value) -> Result<Value> {
        let ctx = RequestContext::for_run(run_id);
        let mut context = Map::new();
        context.insert("mode".into(), json!("sku"));
        context.insert("sku".into(), json!(sku));
        context.insert("payload_keys".into(), json!(payload_keys(payload)));

        let result = self.downstream.update_by_sku(sku, payload, &ctx).await;
        self.finish_bulk(run_id, context, result).await
    }

    async fn finish_bulk(
        &self,
        run_id: &str,
        context: Map<String, Value>,
        result: Result<Value>,
    ) -> Result<Value> {
        match result {
            Ok(response) => {
                self.events
                    .info(run_id, EventType::VariantsBulkUpdated, Value::Object(context), None)
                    .await?;
                Ok(response)
            }
            Err(err) => self.fail(run_id, EventType::VariantsBulkUpdated, context, None, err).await,
        }
    }

    async fn fail(
        &self,
        run_id: &str,
        event_type: EventType,
        mut context: Map<String, Value>,
        ref_id: Option<&str>,
        err: StoreSyncError,
    ) -> Result<Value> {
        append_error_fields(&mut context, &err);
        self.events.error(run_id, event_type, Value::Object(context), ref_id).await?;
        Err(err)
    }
}

impl std::fmt::Debug for CatalogueWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogueWriter").finish_non_exhaustive()
    }
}

/// `status` and `response` for remote errors, `error` for anything else.
pub(crate) fn append_error_fields(context: &mut Map<String, Value>, err: &StoreSyncError) {
    match err.status() {
        Some(status) => {
            context.insert("status".into(), json!(status));
            let response = err
                .response_body()
                .map(|body| serde_json::from_str(body).unwrap_or_else(|_| json!(body)))
                .unwrap_or(Value::Null);
            context.insert("response".into(), response);
        }
        None => {
            context.insert("error".into(), json!(err.to_string()));
        }
    }
}

fn bulk_context(mode: &str, variants: &[Value]) -> Map<String, Value> {
    let ids: Vec<Value> = variants
        .iter()
        .map(|variant| variant.get("id").cloned().unwrap_or(Value::Null))
        .collect();
    let mut context = Map::new();
    context.insert("mode".into(), json!(mode));
    context.insert("variants".into(), Value::Array(ids));
    context
}

fn payload_keys(payload: &Value) -> Vec<String> {
    payload.as_object().map(|map| map.keys().cloned().collect()).unwrap_or_default()
}

fn scalar_at(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
