//! Asynchronous downstream mutation tasks

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::event::EventType;
use super::failure::FailureContext;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdate {
    /// Downstream variant id.
    pub variant_id: String,
    pub price: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_price: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_raw_price: Option<bool>,
    pub run_id: String,
    /// Upstream variant id the value came from.
    #[serde(default)]
    pub source_variant_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUpdate {
    pub variant_id: String,
    pub stock: i64,
    #[serde(default)]
    pub is_relative: bool,
    pub run_id: String,
    #[serde(default)]
    pub source_variant_id: Option<String>,
}

/// A single price or stock write against the downstream platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationTask {
    UpdatePrice(PriceUpdate),
    UpdateStock(StockUpdate),
}

impl MutationTask {
    pub fn variant_id(&self) -> &str {
        match self {
            Self::UpdatePrice(update) => &update.variant_id,
            Self::UpdateStock(update) => &update.variant_id,
        }
    }

    pub fn run_id(&self) -> &str {
        match self {
            Self::UpdatePrice(update) => &update.run_id,
            Self::UpdateStock(update) => &update.run_id,
        }
    }

    pub const fn failure_context(&self) -> FailureContext {
        match self {
            Self::UpdatePrice(_) => FailureContext::DownstreamUpdatePrice,
            Self::UpdateStock(_) => FailureContext::DownstreamUpdateStock,
        }
    }

    pub const fn event_type(&self) -> EventType {
        match self {
            Self::UpdatePrice(_) => EventType::VariantPriceUpdated,
            Self::UpdateStock(_) => EventType::VariantStockUpdated,
        }
    }

    /// Deterministic effective content of the write; hashed into the
    /// idempotency key.
    pub fn fingerprint(&self) -> String {
        match self {
            Self::UpdatePrice(update) => format!(
                "DOWNSTREAM:price:{}:{}:{}",
                update.variant_id,
                update.price,
                update.discount_price.map_or_else(|| "-".to_string(), |d| d.to_string())
            ),
            Self::UpdateStock(update) => format!(
                "DOWNSTREAM:stock:{}:{}:{}",
                update.variant_id,
                update.stock,
                u8::from(update.is_relative)
            ),
        }
    }

    /// Replay payload stored on a Failure row.
    pub fn replay_payload(&self) -> Value {
        match self {
            Self::UpdatePrice(update) => serde_json::to_value(update),
            Self::UpdateStock(update) => serde_json::to_value(update),
        }
        .unwrap_or(Value::Null)
    }

    /// Rebuild a task from a persisted failure; `None` for contexts with no
    /// task counterpart or payloads that no longer parse.
    pub fn from_replay(context: FailureContext, payload: &Value) -> Option<Self> {
        match context {
            FailureContext::DownstreamUpdatePrice => {
                serde_json::from_value(payload.clone()).ok().map(Self::UpdatePrice)
            }
            FailureContext::DownstreamUpdateStock => {
                serde_json::from_value(payload.clone()).ok().map(Self::UpdateStock)
            }
            FailureContext::UpstreamFetch => None,
        }
    }
}
