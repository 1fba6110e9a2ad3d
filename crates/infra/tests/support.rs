//! Shared wiring for integration tests: real SQLite repositories, the reqwest
//! transport and two wiremock servers standing in for the platforms.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{json, Value};
use storesync_common::{CircuitBreaker, Clock, KeyValueStore, RateLimiter, SystemClock};
use storesync_core::{
    CatalogueReconciler, CursorStore, EventRecorder, EventRepository, FailureStore,
    HealthReporter, IdempotencyGuard, MutationExecutor, RequestAuditRepository, SyncDependencies,
    SyncOrchestrator, SyncRunRepository, SyncSettings, TaskQueue,
};
use storesync_domain::{AppConfig, IntegrationEvent};
use storesync_infra::database::{
    DbManager, SqliteCatalogRepository, SqliteCursorRepository, SqliteEventRepository,
    SqliteFailureRepository, SqliteKeyValueStore, SqliteRequestAuditRepository,
    SqliteSyncRunRepository,
};
use storesync_infra::http::{DownstreamClient, UpstreamClient};
use storesync_infra::queue::InMemoryTaskQueue;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct Stack {
    pub upstream: MockServer,
    pub downstream: MockServer,
    pub db: Arc<DbManager>,
    pub queue: Arc<InMemoryTaskQueue>,
    pub orchestrator: SyncOrchestrator,
    pub executor: MutationExecutor,
    pub reconciler: CatalogueReconciler,
    pub failures: FailureStore,
    pub breaker: CircuitBreaker,
    pub health: HealthReporter,
    pub events: Arc<SqliteEventRepository>,
    pub audit: Arc<SqliteRequestAuditRepository>,
    pub runs: Arc<SqliteSyncRunRepository>,
    _dir: TempDir,
}

impl Stack {
    pub async fn start() -> Self {
        let upstream = MockServer::start().await;
        let downstream = MockServer::start().await;

        let mut config = AppConfig::default();
        config.upstream.base_url = upstream.uri();
        config.upstream.token = Some("upstream-token".into());
        config.downstream.base_url = downstream.uri();
        config.downstream.api_key = Some("downstream-key".into());
        config.http.retries = 2;
        config.http.retry_backoff_ms = 1;
        config.http.retry_backoff_max_ms = 5;

        let dir = TempDir::new().unwrap();
        let db = DbManager::new(dir.path().join("storesync.db"), 4).unwrap();
        db.run_migrations().unwrap();
        let db = Arc::new(db);

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let kv: Arc<dyn KeyValueStore> = Arc::new(SqliteKeyValueStore::new(Arc::clone(&db)));
        let breaker = CircuitBreaker::with_defaults(Arc::clone(&kv));

        let audit = Arc::new(SqliteRequestAuditRepository::new(Arc::clone(&db)));
        let events = Arc::new(SqliteEventRepository::new(Arc::clone(&db)));
        let runs = Arc::new(SqliteSyncRunRepository::new(Arc::clone(&db)));
        let audit_port: Arc<dyn RequestAuditRepository> = audit.clone();

        let upstream_client = UpstreamClient::from_config(
            &config.upstream,
            &config.http,
            Arc::clone(&audit_port),
            breaker.clone(),
        )
        .unwrap();
        let downstream_client = Arc::new(
            DownstreamClient::from_config(
                &config.downstream,
                &config.http,
                Arc::clone(&audit_port),
                breaker.clone(),
            )
            .unwrap(),
        );

        let recorder = EventRecorder::new(events.clone() as Arc<dyn EventRepository>, Arc::clone(&clock));
        let failures = FailureStore::new(
            Arc::new(SqliteFailureRepository::new(Arc::clone(&db))),
            Arc::clone(&clock),
        );
        let reconciler = CatalogueReconciler::new(
            Arc::new(SqliteCatalogRepository::new(Arc::clone(&db))),
            Arc::clone(&clock),
        );
        let queue = Arc::new(InMemoryTaskQueue::new());

        let executor = MutationExecutor::new(
            downstream_client.clone(),
            IdempotencyGuard::new(audit_port),
            breaker.clone(),
            RateLimiter::new(kv),
            recorder.clone(),
            failures.clone(),
        );

        let deps = SyncDependencies {
            upstream: Arc::new(upstream_client),
            downstream: downstream_client,
            runs: runs.clone() as Arc<dyn SyncRunRepository>,
            cursors: CursorStore::new(
                Arc::new(SqliteCursorRepository::new(Arc::clone(&db))),
                Arc::clone(&clock),
            ),
            reconciler: reconciler.clone(),
            events: recorder,
            failures: failures.clone(),
            queue: Arc::clone(&queue) as Arc<dyn TaskQueue>,
            clock,
        };
        let orchestrator = SyncOrchestrator::new(deps, SyncSettings::from_config(&config));
        let health =
            HealthReporter::new(runs.clone() as Arc<dyn SyncRunRepository>, failures.clone(), breaker.clone());

        mount_empty_taxonomy(&upstream).await;

        Self {
            upstream,
            downstream,
            db,
            queue,
            orchestrator,
            executor,
            reconciler,
            failures,
            breaker,
            health,
            events,
            audit,
            runs,
            _dir: dir,
        }
    }

    /// Mount one upstream product page.
    pub async fn serve_products(&self, items: Value) {
        Mock::given(method("GET"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": items, "page": 1 })))
            .mount(&self.upstream)
            .await;
    }

    /// Close the queue and collect everything enqueued so far.
    pub async fn drain_queue(&self) -> Vec<storesync_core::QueuedTask> {
        self.queue.close();
        let mut tasks = Vec::new();
        while let Some(task) = self.queue.dequeue().await.unwrap() {
            tasks.push(task);
        }
        tasks
    }

    pub async fn events_for(&self, run_id: &str) -> Vec<IntegrationEvent> {
        self.events.list_for_run(run_id).await.unwrap()
    }
}

/// Categories, attributes and orders answer with empty lists unless a test
/// mounts something more specific first.
async fn mount_empty_taxonomy(server: &MockServer) {
    for endpoint in ["/categories", "/attributes", "/orders"] {
        Mock::given(method("GET"))
            .and(path(endpoint))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
            .with_priority(10)
            .mount(server)
            .await;
    }
}

pub fn upstream_product(variant_price: i64) -> Value {
    json!([{
        "_id": "p1",
        "title": "Blue Mug",
        "categories": [{ "_id": "c1" }],
        "variants": [{ "_id": "v1", "price": variant_price, "stock": 4 }]
    }])
}

/// Downstream listing row whose variant references upstream `v1`.
pub fn downstream_product() -> Value {
    json!({
        "id": "dp1",
        "title": "Blue Mug",
        "variants": [{ "id": "sv1", "sku": "MUG-1", "metadata": { "anar360_variant_id": "v1" } }]
    })
}
