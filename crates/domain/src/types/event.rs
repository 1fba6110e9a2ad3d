//! Integration events appended to a run's timeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    ProductsFetched,
    VariantPriceUpdated,
    VariantStockUpdated,
    DownstreamProductsFetched,
    DownstreamProductsFetchFailed,
    CatalogueUpserted,
    ProductUpserted,
    VariantsBulkUpdated,
    OrderPropagated,
    OrdersFetched,
    OrdersSubmitted,
    OrderSubmitFailed,
    Skipped,
    ValidationFailed,
    RateLimited,
}

crate::impl_wire_conversions!(EventType {
    ProductsFetched => "PRODUCTS_FETCHED",
    VariantPriceUpdated => "VARIANT_PRICE_UPDATED",
    VariantStockUpdated => "VARIANT_STOCK_UPDATED",
    DownstreamProductsFetched => "DOWNSTREAM_PRODUCTS_FETCHED",
    DownstreamProductsFetchFailed => "DOWNSTREAM_PRODUCTS_FETCH_FAILED",
    CatalogueUpserted => "CATALOGUE_UPSERTED",
    ProductUpserted => "PRODUCT_UPSERTED",
    VariantsBulkUpdated => "VARIANTS_BULK_UPDATED",
    OrderPropagated => "ORDER_PROPAGATED",
    OrdersFetched => "ORDERS_FETCHED",
    OrdersSubmitted => "ORDERS_SUBMITTED",
    OrderSubmitFailed => "ORDER_SUBMIT_FAILED",
    Skipped => "SKIPPED",
    ValidationFailed => "VALIDATION_FAILED",
    RateLimited => "RATE_LIMITED",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    #[default]
    Info,
    Warning,
    Error,
}

crate::impl_wire_conversions!(EventLevel {
    Info => "info",
    Warning => "warning",
    Error => "error",
});

/// Reason carried by a `SKIPPED` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    DownstreamDisabled,
    IdempotentHit,
    CircuitOpen,
    MappingMissing,
}

crate::impl_wire_conversions!(SkipReason {
    DownstreamDisabled => "downstream-disabled",
    IdempotentHit => "idempotent-hit",
    CircuitOpen => "circuit-open",
    MappingMissing => "mapping-missing",
});

/// One domain-level occurrence. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationEvent {
    pub id: String,
    pub run_id: String,
    pub event_type: EventType,
    pub ref_id: Option<String>,
    pub payload: Value,
    pub level: EventLevel,
    pub created_at: DateTime<Utc>,
}

impl IntegrationEvent {
    /// Skip reason carried in `SKIPPED` payloads.
    pub fn reason(&self) -> Option<&str> {
        self.payload.get("reason").and_then(Value::as_str)
    }
}
