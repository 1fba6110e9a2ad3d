//! Downstream-local projection of the storefront catalogue
//!
//! Rows are keyed by the downstream identifier and carry the resolved
//! upstream identifier once reconciliation has found one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub downstream_id: String,
    pub title: Option<String>,
    pub title_normalized: Option<String>,
    pub slug: Option<String>,
    pub upstream_product_id: Option<String>,
    pub raw_payload: Value,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogVariant {
    pub downstream_id: String,
    /// Downstream id of the owning product.
    pub product_id: String,
    pub title: Option<String>,
    pub sku: Option<String>,
    pub upstream_variant_id: Option<String>,
    pub external_references: Vec<String>,
    pub raw_payload: Value,
    pub synced_at: DateTime<Utc>,
}
