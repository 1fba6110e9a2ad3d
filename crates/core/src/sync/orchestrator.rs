//! Run orchestration
//!
//! An incremental product sync fetches one upstream page, resolves every
//! variant to its downstream counterpart and enqueues independent price and
//! stock tasks. A catalogue sync walks the downstream product listing through
//! the reconciler. Both own exactly one [`SyncRun`] which always ends
//! terminal; partial progress (events, cursors, mappings) is never rolled
//! back.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};
use storesync_common::{idempotency_key, Clock};
use storesync_domain::constants::{
    DEFAULT_DOWNSTREAM_PAGE_SIZE, DEFAULT_UPSTREAM_PAGE_LIMIT, DEFAULT_UPSTREAM_SINCE_MS,
    SCOPE_DOWNSTREAM_PRODUCTS, SCOPE_INCREMENTAL,
};
use storesync_domain::{
    AppConfig, EventType, FailureContext, MutationTask, OrderCreateDto, PageMeta, PriceUpdate,
    ProductDto, Result, RunStatus, SkipReason, StockUpdate, StoreSyncError, SyncRun,
};
use tracing::{info, instrument, warn};

use super::cursor::CursorStore;
use super::ports::SyncRunRepository;
use crate::audit::EventRecorder;
use crate::catalog::{CatalogueReconciler, ReconcileSummary};
use crate::failures::FailureStore;
use crate::mutation::{QueuedTask, TaskQueue};
use crate::remote_ports::{DownstreamApi, RequestContext, UpstreamApi};

/// Knobs resolved from [`AppConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    pub upstream_enabled: bool,
    pub downstream_enabled: bool,
    pub page_limit: u32,
    pub orders_page_limit: Option<u32>,
    pub since_ms: i64,
    pub downstream_page_size: u32,
    /// Order drafts submitted upstream on every product sync.
    pub pending_orders: Vec<OrderCreateDto>,
}

impl SyncSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            upstream_enabled: config.upstream.enabled,
            downstream_enabled: config.downstream.enabled,
            page_limit: config.upstream.page_limit,
            orders_page_limit: config.upstream.orders_page_limit,
            since_ms: config.upstream.since_ms,
            downstream_page_size: config.downstream.page_size,
            pending_orders: config.upstream.pending_orders.clone(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            upstream_enabled: true,
            downstream_enabled: true,
            page_limit: DEFAULT_UPSTREAM_PAGE_LIMIT,
            orders_page_limit: None,
            since_ms: DEFAULT_UPSTREAM_SINCE_MS,
            downstream_page_size: DEFAULT_DOWNSTREAM_PAGE_SIZE,
            pending_orders: Vec::new(),
        }
    }
}

/// Collaborators shared by every orchestrated run.
#[derive(Clone)]
pub struct SyncDependencies {
    pub upstream: Arc<dyn UpstreamApi>,
    pub downstream: Arc<dyn DownstreamApi>,
    pub runs: Arc<dyn SyncRunRepository>,
    pub cursors: CursorStore,
    pub reconciler: CatalogueReconciler,
    pub events: EventRecorder,
    pub failures: FailureStore,
    pub queue: Arc<dyn TaskQueue>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductSyncRequest {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub since_ms: Option<i64>,
    pub scope: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogueSyncRequest {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    /// Keep paging while the listing reports more.
    pub fetch_all: bool,
}

impl Default for CatalogueSyncRequest {
    fn default() -> Self {
        Self { page: None, page_size: None, fetch_all: true }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrderSyncSummary {
    pub fetched: usize,
    pub submitted: usize,
}

/// Runs produced by [`SyncOrchestrator::run_full_sync`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FullSyncOutcome {
    pub catalogue: Option<SyncRun>,
    pub products: Option<SyncRun>,
}

/// Result of a successful run body, applied to the run afterwards.
struct RunProgress {
    page: u32,
    pages_total: Option<u32>,
    totals: Map<String, Value>,
}

#[derive(Default)]
struct Taxonomy {
    categories: HashMap<String, String>,
    attributes: HashMap<String, String>,
}

impl Taxonomy {
    fn category_names(&self, product: &ProductDto) -> Vec<String> {
        product
            .category_ids
            .iter()
            .map(|id| self.categories.get(id).cloned().unwrap_or_else(|| id.clone()))
            .collect()
    }

    fn attribute_keys(&self, product: &ProductDto) -> Vec<String> {
        product
            .metadata
            .get("attributes")
            .and_then(Value::as_object)
            .map(|attrs| {
                attrs
                    .keys()
                    .map(|key| self.attributes.get(key).cloned().unwrap_or_else(|| key.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub struct SyncOrchestrator {
    deps: SyncDependencies,
    settings: SyncSettings,
}

impl SyncOrchestrator {
    pub fn new(deps: SyncDependencies, settings: SyncSettings) -> Self {
        Self { deps, settings }
    }

    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Incremental product sync. `None` when the upstream integration is
    /// disabled; otherwise the finished run, failed or not.
    #[instrument(skip(self))]
    pub async fn sync_products(&self, request: ProductSyncRequest) -> Result<Option<SyncRun>> {
        if !self.settings.upstream_enabled {
            info!("upstream integration disabled, product sync skipped");
            return Ok(None);
        }

        let page = request.page.unwrap_or(1).max(1);
        let limit = request.limit.unwrap_or(self.settings.page_limit);
        let since_ms = request.since_ms.unwrap_or(self.settings.since_ms);
        let scope = request.scope.unwrap_or_else(|| SCOPE_INCREMENTAL.to_string());

        let mut run = SyncRun::start(scope, page, Some(since_ms), self.deps.clock.now());
        self.deps.runs.create(&run).await?;
        info!(run_id = %run.id, page, limit, since_ms, "product sync started");

        let result = self.run_products(&run.id, page, limit, since_ms).await;
        self.finish(&mut run, result).await?;
        Ok(Some(run))
    }

    async fn run_products(
        &self,
        run_id: &str,
        page: u32,
        limit: u32,
        since_ms: i64,
    ) -> Result<RunProgress> {
        let ctx = RequestContext::for_run(run_id);
        let taxonomy = self.taxonomy(limit, &ctx).await?;

        let products = match self.deps.upstream.fetch_products(page, limit, since_ms, &ctx).await {
            Ok(products) => products,
            Err(err) => {
                self.deps
                    .events
                    .error(
                        run_id,
                        EventType::ValidationFailed,
                        json!({ "page": page, "limit": limit, "exception": err.to_string() }),
                        None,
                    )
                    .await?;
                if err.is_transient() {
                    self.deps
                        .failures
                        .persist(
                            FailureContext::UpstreamFetch,
                            Some(&format!("products:page:{page}")),
                            json!({ "page": page, "limit": limit, "since_ms": since_ms }),
                            &err.to_string(),
                        )
                        .await?;
                }
                return Err(err);
            }
        };

        self.deps
            .events
            .info(
                run_id,
                EventType::ProductsFetched,
                json!({ "page": page, "limit": limit, "count": products.items.len() }),
                None,
            )
            .await?;

        let mut jobs = 0usize;
        let mut skipped = 0usize;
        let mut variants = 0usize;
        for product in &products.items {
            self.deps.reconciler.ensure_product_mapping(product).await?;

            for variant in &product.variants {
                variants += 1;
                let Some(mapped) = self.deps.reconciler.resolve_variant(&variant.id).await? else {
                    self.deps
                        .events
                        .warning(
                            run_id,
                            EventType::Skipped,
                            json!({
                                "reason": SkipReason::MappingMissing.as_str(),
                                "variant_id": variant.id,
                                "product_id": product.id,
                                "category_names": taxonomy.category_names(product),
                                "attribute_keys": taxonomy.attribute_keys(product),
                            }),
                            Some(&variant.id),
                        )
                        .await?;
                    skipped += 1;
                    continue;
                };

                let price = MutationTask::UpdatePrice(PriceUpdate {
                    variant_id: mapped.downstream_id.clone(),
                    price: variant.price,
                    discount_price: None,
                    has_raw_price: None,
                    run_id: run_id.to_string(),
                    source_variant_id: Some(variant.id.clone()),
                });
                let stock = MutationTask::UpdateStock(StockUpdate {
                    variant_id: mapped.downstream_id,
                    stock: variant.stock,
                    is_relative: false,
                    run_id: run_id.to_string(),
                    source_variant_id: Some(variant.id.clone()),
                });
                self.deps.queue.enqueue(QueuedTask::new(price)).await?;
                self.deps.queue.enqueue(QueuedTask::new(stock)).await?;
                jobs += 2;
            }
        }

        self.deps
            .events
            .info(
                run_id,
                EventType::ProductsFetched,
                json!({
                    "jobs": jobs,
                    "skipped": skipped,
                    "category_map_count": taxonomy.categories.len(),
                    "attribute_map_count": taxonomy.attributes.len(),
                }),
                None,
            )
            .await?;

        let orders = self.sync_orders(run_id, None).await?;

        self.deps.cursors.record_products_page(page).await?;
        self.deps.cursors.record_products_since(since_ms).await?;

        let mut totals = Map::new();
        totals.insert("products".into(), json!(products.items.len()));
        totals.insert("variants".into(), json!(variants));
        totals.insert("jobs".into(), json!(jobs));
        totals.insert("skipped".into(), json!(skipped));
        totals.insert("orders".into(), json!(orders));

        Ok(RunProgress {
            page: products.meta.page().unwrap_or(page),
            pages_total: products.meta.pages_total(),
            totals,
        })
    }

    /// id→name and key→name maps used to enrich skip events.
    async fn taxonomy(&self, limit: u32, ctx: &RequestContext) -> Result<Taxonomy> {
        let categories = self.deps.upstream.fetch_categories(1, limit, ctx).await?;
        let attributes = self.deps.upstream.fetch_attributes(1, limit, ctx).await?;

        Ok(Taxonomy {
            categories: categories.items.into_iter().map(|c| (c.id, c.name)).collect(),
            attributes: attributes.items.into_iter().map(|a| (a.key, a.name)).collect(),
        })
    }

    /// Fetch the first page of upstream orders and submit the configured
    /// drafts. A failed submission is recorded and does not stop the others.
    #[instrument(skip(self))]
    pub async fn sync_orders(&self, run_id: &str, limit: Option<u32>) -> Result<OrderSyncSummary> {
        let limit = limit
            .or(self.settings.orders_page_limit)
            .unwrap_or(self.settings.page_limit);
        let ctx = RequestContext::for_run(run_id);

        let fetched = self.deps.upstream.fetch_orders(1, limit, &ctx).await?;
        self.deps
            .events
            .info(run_id, EventType::OrdersFetched, json!({ "count": fetched.items.len() }), None)
            .await?;

        let mut summary = OrderSyncSummary { fetched: fetched.items.len(), submitted: 0 };
        for draft in &self.settings.pending_orders {
            let mut draft = draft.clone();
            let key = match draft.idempotency_key.clone() {
                Some(key) => key,
                None => order_key(&draft)?,
            };
            draft.idempotency_key = Some(key.clone());

            let ctx = RequestContext::for_run(run_id).with_idempotency_key(key.clone());
            match self.deps.upstream.create_order(&draft, &ctx).await {
                Ok(result) => {
                    summary.submitted += 1;
                    info!(idempotency_key = %key, orders = result.orders.len(), "order submitted");
                }
                Err(err) => {
                    warn!(idempotency_key = %key, error = %err, "order submission failed");
                    self.deps
                        .events
                        .error(
                            run_id,
                            EventType::OrderSubmitFailed,
                            json!({
                                "idempotency_key": key,
                                "items": draft.items.len(),
                                "error": err.to_string(),
                            }),
                            None,
                        )
                        .await?;
                }
            }
        }

        if summary.submitted > 0 {
            self.deps
                .events
                .info(run_id, EventType::OrdersSubmitted, json!({ "count": summary.submitted }), None)
                .await?;
        }
        Ok(summary)
    }

    /// Walk the downstream product listing through the reconciler. `None`
    /// when the downstream integration is disabled.
    #[instrument(skip(self))]
    pub async fn sync_catalogue(&self, request: CatalogueSyncRequest) -> Result<Option<SyncRun>> {
        if !self.settings.downstream_enabled {
            info!("downstream integration disabled, catalogue sync skipped");
            return Ok(None);
        }

        let page = request.page.unwrap_or(1).max(1);
        let page_size = request.page_size.unwrap_or(self.settings.downstream_page_size);

        let mut run = SyncRun::start(SCOPE_DOWNSTREAM_PRODUCTS, page, None, self.deps.clock.now());
        self.deps.runs.create(&run).await?;
        info!(run_id = %run.id, page, page_size, "catalogue sync started");

        let result = self.run_catalogue(&run.id, page, page_size, request.fetch_all).await;
        self.finish(&mut run, result).await?;
        Ok(Some(run))
    }

    async fn run_catalogue(
        &self,
        run_id: &str,
        mut page: u32,
        page_size: u32,
        fetch_all: bool,
    ) -> Result<RunProgress> {
        let ctx = RequestContext::for_run(run_id);
        let mut records = 0usize;
        let mut reconciled = ReconcileSummary::default();
        let mut pages_total = None;

        loop {
            let listing = match self.deps.downstream.fetch_products(page, page_size, &ctx).await {
                Ok(listing) => listing,
                Err(err) => {
                    self.deps
                        .events
                        .error(
                            run_id,
                            EventType::DownstreamProductsFetchFailed,
                            json!({ "page": page, "limit": page_size, "exception": err.to_string() }),
                            None,
                        )
                        .await?;
                    return Err(err);
                }
            };

            let count = listing.items.len();
            self.deps
                .events
                .info(
                    run_id,
                    EventType::DownstreamProductsFetched,
                    json!({
                        "page": page,
                        "limit": page_size,
                        "count": count,
                        "meta": listing.meta.summary(),
                    }),
                    None,
                )
                .await?;

            let summary = self.deps.reconciler.reconcile(&listing.items).await?;
            self.deps
                .events
                .info(
                    run_id,
                    EventType::CatalogueUpserted,
                    json!({
                        "page": page,
                        "products": summary.products_upserted,
                        "variants": summary.variants_upserted,
                        "mappings": summary.mappings_attached,
                    }),
                    None,
                )
                .await?;

            records += count;
            reconciled.absorb(summary);
            pages_total = listing.meta.pages_total().or(pages_total);
            self.deps.cursors.record_downstream_page(page).await?;

            if !fetch_all || !has_more(&listing.meta, page, count, page_size) {
                break;
            }
            let next = listing
                .meta
                .next_page()
                .unwrap_or_else(|| listing.meta.page().unwrap_or(page).saturating_add(1));
            if next <= page {
                break;
            }
            page = next;
        }

        let mut totals = Map::new();
        totals.insert("products".into(), json!(records));
        totals.insert("variants".into(), json!(reconciled.variants_upserted));
        totals.insert("mappings".into(), json!(reconciled.mappings_attached));

        Ok(RunProgress { page, pages_total, totals })
    }

    /// Catalogue sync followed by the incremental product sync. A failed
    /// catalogue run aborts before any product is fetched.
    pub async fn run_full_sync(&self) -> Result<FullSyncOutcome> {
        let catalogue = self.sync_catalogue(CatalogueSyncRequest::default()).await?;
        if catalogue.as_ref().is_some_and(|run| run.status == RunStatus::Failed) {
            warn!("catalogue sync failed, full sync aborted");
            return Ok(FullSyncOutcome { catalogue, products: None });
        }

        let products = self.sync_products(ProductSyncRequest::default()).await?;
        Ok(FullSyncOutcome { catalogue, products })
    }

    async fn finish(&self, run: &mut SyncRun, result: Result<RunProgress>) -> Result<()> {
        let now = self.deps.clock.now();
        match result {
            Ok(progress) => {
                run.mark_success(now, progress.page, progress.pages_total, progress.totals)?;
                info!(run_id = %run.id, scope = %run.scope, "sync run succeeded");
            }
            Err(err) => {
                run.mark_failed(now, err.to_string())?;
                warn!(run_id = %run.id, scope = %run.scope, error = %err, "sync run failed");
            }
        }
        self.deps.runs.update(run).await
    }
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator").field("settings", &self.settings).finish_non_exhaustive()
    }
}

/// More pages follow when the listing says so, when the current page is
/// below the reported total, or when a full page came back.
fn has_more(meta: &PageMeta, page: u32, count: usize, page_size: u32) -> bool {
    let full_page = count > 0 && u32::try_from(count).map_or(true, |count| count >= page_size);
    meta.has_more() || meta.pages_total().is_some_and(|total| page < total) || full_page
}

/// Deterministic key for an order draft without one.
fn order_key(draft: &OrderCreateDto) -> Result<String> {
    let body = serde_json::to_string(draft)
        .map_err(|err| StoreSyncError::InvalidInput(format!("order draft does not encode: {err}")))?;
    Ok(idempotency_key(&format!("UPSTREAM:order:{body}")))
}
