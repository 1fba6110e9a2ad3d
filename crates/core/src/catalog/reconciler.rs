//! Catalogue reconciliation between the two identifier spaces
//!
//! Downstream rows carry arbitrary vendor metadata. Variants are mapped to
//! upstream ids through reference keys found anywhere in their metadata
//! containers; products fall back to a normalised-title match.
//!
//! A stored mapping only ever moves from unmapped to mapped, or from one
//! present id to a different present id. Absence of a reference in a later
//! batch never clears it.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use storesync_common::{normalize_title, Clock};
use storesync_domain::{CatalogProduct, CatalogVariant, ProductDto, Result};
use tracing::{debug, info, instrument};

use super::ports::CatalogRepository;

/// Foreign-id naming conventions seen in vendor metadata.
const REFERENCE_KEYS: [&str; 12] = [
    "anar360_variant_id",
    "anar_variant_id",
    "anar360Id",
    "anarId",
    "external_id",
    "externalId",
    "integration_id",
    "integrationId",
    "foreign_id",
    "foreignId",
    "reference_id",
    "referenceId",
];

const NESTED_CONTAINERS: [&str; 4] = ["metadata", "meta", "attributes", "extras"];

/// Sub-trees holding other records' references.
const EXCLUDED_SUBTREES: [&str; 2] = ["variants", "products"];

const PRODUCT_ID_KEYS: [&str; 4] = ["id", "sazito_id", "_id", "product_id"];
const VARIANT_ID_KEYS: [&str; 4] = ["id", "sazito_id", "_id", "variant_id"];

/// Counters for one reconciled batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub products_upserted: u32,
    /// Variants seen for the first time.
    pub variants_upserted: u32,
    pub mappings_attached: u32,
}

impl ReconcileSummary {
    pub fn absorb(&mut self, other: Self) {
        self.products_upserted += other.products_upserted;
        self.variants_upserted += other.variants_upserted;
        self.mappings_attached += other.mappings_attached;
    }
}

#[derive(Clone)]
pub struct CatalogueReconciler {
    repository: Arc<dyn CatalogRepository>,
    clock: Arc<dyn Clock>,
}

impl CatalogueReconciler {
    pub fn new(repository: Arc<dyn CatalogRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Upsert a batch of raw downstream product rows and their variants.
    #[instrument(skip_all, fields(records = records.len()))]
    pub async fn reconcile(&self, records: &[Value]) -> Result<ReconcileSummary> {
        let now = self.clock.now();
        let mut summary = ReconcileSummary::default();

        for record in records {
            let Value::Object(record) = record else { continue };
            let Some(product_id) = stable_id(record, &PRODUCT_ID_KEYS) else {
                debug!("downstream product without id skipped");
                continue;
            };

            let existing = self.repository.find_product(&product_id).await?;
            let title = string_field(record, &["title", "name"]);
            let product = CatalogProduct {
                title_normalized: title.as_deref().and_then(normalize_title),
                title,
                slug: string_field(record, &["slug"]),
                upstream_product_id: existing.and_then(|product| product.upstream_product_id),
                raw_payload: raw_payload(record),
                synced_at: now,
                downstream_id: product_id.clone(),
            };
            self.repository.upsert_product(&product).await?;
            summary.products_upserted += 1;

            let variants = record.get("variants").and_then(Value::as_array);
            for variant in variants.into_iter().flatten() {
                let Value::Object(variant) = variant else { continue };
                summary.absorb(self.reconcile_variant(&product_id, variant, now).await?);
            }
        }

        info!(
            products = summary.products_upserted,
            variants = summary.variants_upserted,
            mappings = summary.mappings_attached,
            "catalogue batch reconciled"
        );
        Ok(summary)
    }

    async fn reconcile_variant(
        &self,
        product_id: &str,
        variant: &Map<String, Value>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<ReconcileSummary> {
        let mut summary = ReconcileSummary::default();
        let Some(variant_id) = stable_id(variant, &VARIANT_ID_KEYS) else {
            return Ok(summary);
        };

        let references = extract_external_references(variant);
        let resolved = resolve_external_id(&references);

        let existing = self.repository.find_variant(&variant_id).await?;
        let current = existing.as_ref().and_then(|row| row.upstream_variant_id.clone());
        let attach = resolved.is_some() && resolved != current;

        let row = CatalogVariant {
            downstream_id: variant_id.clone(),
            product_id: product_id.to_string(),
            title: string_field(variant, &["title", "name"]),
            sku: string_field(variant, &["sku", "code", "product_code"]),
            upstream_variant_id: if attach { resolved.clone() } else { current },
            external_references: references,
            raw_payload: raw_payload(variant),
            synced_at: now,
        };
        self.repository.upsert_variant(&row).await?;

        if attach {
            debug!(variant_id = %variant_id, upstream_variant_id = ?resolved, "variant mapping attached");
            summary.mappings_attached += 1;
        }
        if existing.is_none() {
            summary.variants_upserted += 1;
        }
        Ok(summary)
    }

    /// Downstream product for an upstream product, attaching a title match
    /// when no stored mapping exists yet.
    pub async fn ensure_product_mapping(&self, product: &ProductDto) -> Result<Option<CatalogProduct>> {
        if let Some(mapped) = self.repository.find_product_by_upstream_id(&product.id).await? {
            return Ok(Some(mapped));
        }

        let Some(title) = normalize_title(&product.title) else {
            return Ok(None);
        };
        let Some(mut candidate) = self.repository.find_latest_product_by_title(&title).await? else {
            return Ok(None);
        };

        if candidate.upstream_product_id.as_deref() != Some(product.id.as_str()) {
            candidate.upstream_product_id = Some(product.id.clone());
            self.repository.upsert_product(&candidate).await?;
            info!(
                upstream_product_id = %product.id,
                downstream_product_id = %candidate.downstream_id,
                "product mapped by title"
            );
        }
        Ok(Some(candidate))
    }

    /// Downstream variant mapped to `upstream_variant_id`.
    pub async fn resolve_variant(&self, upstream_variant_id: &str) -> Result<Option<CatalogVariant>> {
        self.repository.find_variant_by_upstream_id(upstream_variant_id).await
    }
}

impl std::fmt::Debug for CatalogueReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogueReconciler").finish_non_exhaustive()
    }
}

/// Reference candidates in discovery order: top-level keys first, then the
/// metadata containers depth-first. Duplicates and empty strings are dropped.
pub fn extract_external_references(record: &Map<String, Value>) -> Vec<String> {
    let mut found = Vec::new();
    collect_direct(record, &mut found);
    for container in NESTED_CONTAINERS {
        if let Some(nested) = record.get(container) {
            collect_nested(nested, &mut found);
        }
    }

    let mut unique: Vec<String> = Vec::with_capacity(found.len());
    for reference in found {
        if !reference.is_empty() && !unique.contains(&reference) {
            unique.push(reference);
        }
    }
    unique
}

/// Prefer a 24-digit hex object id (lowercased); otherwise the first
/// candidate.
pub fn resolve_external_id(references: &[String]) -> Option<String> {
    references
        .iter()
        .find(|reference| is_object_id(reference))
        .map(|reference| reference.to_ascii_lowercase())
        .or_else(|| references.first().cloned())
}

fn is_object_id(value: &str) -> bool {
    value.len() == 24 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

fn collect_direct(map: &Map<String, Value>, found: &mut Vec<String>) {
    for key in REFERENCE_KEYS {
        if let Some(value) = map.get(key).and_then(scalar_string) {
            found.push(value);
        }
    }
}

fn collect_nested(value: &Value, found: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            collect_direct(map, found);
            for (key, child) in map {
                if EXCLUDED_SUBTREES.contains(&key.as_str()) {
                    continue;
                }
                if child.is_object() || child.is_array() {
                    collect_nested(child, found);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter().filter(|item| item.is_object() || item.is_array()) {
                collect_nested(item, found);
            }
        }
        _ => {}
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First candidate key holding a non-empty scalar.
fn stable_id(record: &Map<String, Value>, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|key| record.get(*key).and_then(scalar_string))
        .find(|id| !id.is_empty())
}

fn string_field(record: &Map<String, Value>, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|key| record.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .next()
}

fn raw_payload(record: &Map<String, Value>) -> Value {
    record.get("raw").cloned().unwrap_or_else(|| Value::Object(record.clone()))
}
