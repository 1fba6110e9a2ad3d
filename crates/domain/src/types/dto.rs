//! Canonical boundary DTOs
//!
//! Vendor payloads are normalized onto these structs by the HTTP clients
//! before any core logic sees them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Result, StoreSyncError};

/// Upstream product with its sellable variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDto {
    pub id: String,
    pub title: String,
    pub variants: Vec<VariantDto>,
    #[serde(default)]
    pub category_ids: Vec<String>,
    /// Every vendor field not mapped onto a canonical one.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantDto {
    pub id: String,
    pub price: i64,
    pub stock: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDto {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub attribute_ids: Vec<String>,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDto {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

/// Pagination block returned next to a list of items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageMeta(pub Map<String, Value>);

impl PageMeta {
    pub fn page(&self) -> Option<u32> {
        self.number("page")
    }

    pub fn pages_total(&self) -> Option<u32> {
        self.number("pages_total")
    }

    pub fn next_page(&self) -> Option<u32> {
        self.number("next_page")
    }

    /// Only an explicit boolean `true` counts.
    pub fn has_more(&self) -> bool {
        matches!(self.0.get("has_more"), Some(Value::Bool(true)))
    }

    /// Subset surfaced in fetch events.
    pub fn summary(&self) -> Value {
        let mut summary = Map::new();
        for key in ["page", "pages_total", "has_more", "next_page"] {
            if let Some(value) = self.0.get(key) {
                summary.insert(key.to_string(), value.clone());
            }
        }
        Value::Object(summary)
    }

    fn number(&self, key: &str) -> Option<u32> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// A page of normalized items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, meta: PageMeta) -> Self {
        Self { items, meta }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemDto {
    pub variation: String,
    pub amount: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAddressDto {
    pub postal_code: String,
    pub detail: String,
    pub trans_feree: String,
    pub trans_feree_mobile: String,
    pub city: String,
    pub province: String,
}

impl OrderAddressDto {
    /// Names of the fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("postalCode", &self.postal_code),
            ("detail", &self.detail),
            ("transFeree", &self.trans_feree),
            ("transFereeMobile", &self.trans_feree_mobile),
            ("city", &self.city),
            ("province", &self.province),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderShipmentDto {
    pub shipment_id: Option<String>,
    pub delivery_id: Option<String>,
    pub shipments_reference_id: Option<String>,
    pub description: Option<String>,
}

/// Order draft submitted to the upstream platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreateDto {
    #[serde(rename = "type")]
    pub order_type: String,
    pub items: Vec<OrderItemDto>,
    pub address: OrderAddressDto,
    #[serde(default)]
    pub shipments: Vec<OrderShipmentDto>,
    /// Sent as a header, never in the body.
    #[serde(default, skip_serializing)]
    pub idempotency_key: Option<String>,
}

impl OrderCreateDto {
    /// Checks the draft before submission; failures are local errors.
    pub fn validate(&self) -> Result<()> {
        if self.order_type != "retail" {
            return Err(invalid_order(format!("type must be 'retail', got '{}'", self.order_type)));
        }
        if self.items.is_empty() {
            return Err(invalid_order("at least one item is required".into()));
        }
        if let Some(item) = self.items.iter().find(|item| item.variation.trim().is_empty()) {
            return Err(invalid_order(format!("item with amount {} has no variation", item.amount)));
        }
        if let Some(item) = self.items.iter().find(|item| item.amount < 1) {
            return Err(invalid_order(format!("item {} must have amount >= 1", item.variation)));
        }
        let missing = self.address.missing_fields();
        if !missing.is_empty() {
            return Err(invalid_order(format!("address is missing {}", missing.join(", "))));
        }
        Ok(())
    }
}

fn invalid_order(reason: String) -> StoreSyncError {
    StoreSyncError::InvalidInput(format!("invalid order create payload: {reason}"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDto {
    pub id: String,
    pub order_type: Option<String>,
    pub status: Option<String>,
    pub items: Vec<Value>,
    pub shipments: Vec<Value>,
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSubmissionResult {
    pub success: bool,
    pub orders: Vec<OrderDto>,
    pub payment_link: Option<String>,
    pub message: Option<String>,
}
