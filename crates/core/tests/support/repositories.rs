//! Mock repository implementations for testing
//!
//! In-memory versions of every core persistence port, plus a queue that
//! records what was enqueued instead of delivering it.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use storesync_core::{
    CatalogRepository, CursorRepository, EventRepository, FailureRepository, FailureUpsert,
    QueuedTask, RequestAuditRepository, SyncRunRepository, TaskQueue,
};
use storesync_domain::{
    new_record_id, CatalogProduct, CatalogVariant, Driver, EventType, ExternalRequestRecord,
    Failure, FailureContext, IntegrationEvent, RequestOutcome, Result as DomainResult,
    StoreSyncError, SyncCursor, SyncRun,
};

#[derive(Default)]
pub struct InMemorySyncRuns {
    runs: Mutex<Vec<SyncRun>>,
}

impl InMemorySyncRuns {
    pub fn all(&self) -> Vec<SyncRun> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncRunRepository for InMemorySyncRuns {
    async fn create(&self, run: &SyncRun) -> DomainResult<()> {
        self.runs.lock().unwrap().push(run.clone());
        Ok(())
    }

    async fn update(&self, run: &SyncRun) -> DomainResult<()> {
        let mut runs = self.runs.lock().unwrap();
        let slot = runs
            .iter_mut()
            .find(|existing| existing.id == run.id)
            .ok_or_else(|| StoreSyncError::NotFound(format!("sync run {}", run.id)))?;
        *slot = run.clone();
        Ok(())
    }

    async fn find(&self, id: &str) -> DomainResult<Option<SyncRun>> {
        Ok(self.runs.lock().unwrap().iter().find(|run| run.id == id).cloned())
    }

    async fn latest(&self) -> DomainResult<Option<SyncRun>> {
        // max_by_key keeps the last of equal keys, i.e. the newest insert.
        Ok(self.runs.lock().unwrap().iter().max_by_key(|run| run.created_at).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryRequestAudit {
    records: Mutex<Vec<ExternalRequestRecord>>,
}

impl InMemoryRequestAudit {
    pub fn all(&self) -> Vec<ExternalRequestRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn successes_for(&self, key: &str) -> usize {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|record| {
                record.outcome == RequestOutcome::Success
                    && record.idempotency_key.as_deref() == Some(key)
            })
            .count()
    }

    /// Seed a successful attempt carrying `key`.
    pub fn seed_success(&self, driver: Driver, key: &str, now: DateTime<Utc>) {
        self.records.lock().unwrap().push(ExternalRequestRecord {
            id: new_record_id(),
            run_id: None,
            driver,
            method: "PUT".into(),
            url: "https://downstream.test/seeded".into(),
            query: None,
            request_headers: None,
            request_body: None,
            response_status: Some(200),
            response_headers: None,
            response_body: None,
            duration_ms: Some(1),
            attempt: 1,
            outcome: RequestOutcome::Success,
            idempotency_key: Some(key.to_string()),
            created_at: now,
        });
    }
}

#[async_trait]
impl RequestAuditRepository for InMemoryRequestAudit {
    async fn record(&self, record: &ExternalRequestRecord) -> DomainResult<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn has_success(&self, driver: Driver, idempotency_key: &str) -> DomainResult<bool> {
        Ok(self.records.lock().unwrap().iter().any(|record| {
            record.driver == driver
                && record.outcome == RequestOutcome::Success
                && record.idempotency_key.as_deref() == Some(idempotency_key)
        }))
    }

    async fn find_by_idempotency_key(
        &self,
        idempotency_key: &str,
    ) -> DomainResult<Vec<ExternalRequestRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|record| record.idempotency_key.as_deref() == Some(idempotency_key))
            .cloned()
            .collect())
    }

    async fn list_for_run(&self, run_id: &str) -> DomainResult<Vec<ExternalRequestRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|record| record.run_id.as_deref() == Some(run_id))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryEvents {
    events: Mutex<Vec<IntegrationEvent>>,
}

impl InMemoryEvents {
    pub fn all(&self) -> Vec<IntegrationEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn of_type(&self, event_type: EventType) -> Vec<IntegrationEvent> {
        self.all().into_iter().filter(|event| event.event_type == event_type).collect()
    }

    /// `SKIPPED` events carrying `reason`.
    pub fn skipped(&self, reason: &str) -> Vec<IntegrationEvent> {
        self.of_type(EventType::Skipped)
            .into_iter()
            .filter(|event| event.reason() == Some(reason))
            .collect()
    }
}

#[async_trait]
impl EventRepository for InMemoryEvents {
    async fn append(&self, event: &IntegrationEvent) -> DomainResult<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn list_for_run(&self, run_id: &str) -> DomainResult<Vec<IntegrationEvent>> {
        Ok(self.all().into_iter().filter(|event| event.run_id == run_id).collect())
    }
}

#[derive(Default)]
pub struct InMemoryCursors {
    cursors: Mutex<HashMap<String, SyncCursor>>,
}

#[async_trait]
impl CursorRepository for InMemoryCursors {
    async fn get(&self, key: &str) -> DomainResult<Option<SyncCursor>> {
        Ok(self.cursors.lock().unwrap().get(key).cloned())
    }

    async fn upsert(&self, cursor: &SyncCursor) -> DomainResult<()> {
        self.cursors.lock().unwrap().insert(cursor.key.clone(), cursor.clone());
        Ok(())
    }

    async fn list(&self) -> DomainResult<Vec<SyncCursor>> {
        let mut cursors: Vec<_> = self.cursors.lock().unwrap().values().cloned().collect();
        cursors.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(cursors)
    }
}

#[derive(Default)]
pub struct InMemoryFailures {
    rows: Mutex<Vec<Failure>>,
}

impl InMemoryFailures {
    pub fn all(&self) -> Vec<Failure> {
        self.rows.lock().unwrap().clone()
    }

    /// Insert a row as-is, bypassing upsert bookkeeping.
    pub fn seed(&self, failure: Failure) {
        self.rows.lock().unwrap().push(failure);
    }
}

#[async_trait]
impl FailureRepository for InMemoryFailures {
    async fn upsert(&self, failure: &FailureUpsert) -> DomainResult<Failure> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows
            .iter_mut()
            .find(|row| row.context == failure.context && row.ref_id == failure.ref_id)
        {
            row.payload = failure.payload.clone();
            row.last_error = Some(failure.error.clone());
            row.attempts += 1;
            row.next_retry_at = Some(failure.next_retry_at);
            row.updated_at = failure.now;
            return Ok(row.clone());
        }

        let row = Failure {
            id: new_record_id(),
            context: failure.context,
            ref_id: failure.ref_id.clone(),
            payload: failure.payload.clone(),
            last_error: Some(failure.error.clone()),
            attempts: 1,
            next_retry_at: Some(failure.next_retry_at),
            created_at: failure.now,
            updated_at: failure.now,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn find(
        &self,
        context: FailureContext,
        ref_id: Option<&str>,
    ) -> DomainResult<Option<Failure>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.context == context && row.ref_id.as_deref() == ref_id)
            .cloned())
    }

    async fn due(
        &self,
        now: DateTime<Utc>,
        max_attempts: u32,
        limit: usize,
    ) -> DomainResult<Vec<Failure>> {
        let mut due: Vec<Failure> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.is_due(now, max_attempts))
            .cloned()
            .collect();
        // Unscheduled rows sort first.
        due.sort_by_key(|row| row.next_retry_at);
        due.truncate(limit);
        Ok(due)
    }

    async fn reschedule(
        &self,
        id: &str,
        next_retry_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or_else(|| StoreSyncError::NotFound(format!("failure {id}")))?;
        row.next_retry_at = Some(next_retry_at);
        row.attempts += 1;
        row.updated_at = now;
        Ok(())
    }

    async fn count(&self) -> DomainResult<u64> {
        Ok(self.rows.lock().unwrap().len() as u64)
    }
}

#[derive(Default)]
pub struct InMemoryCatalog {
    products: Mutex<HashMap<String, CatalogProduct>>,
    variants: Mutex<HashMap<String, CatalogVariant>>,
}

impl InMemoryCatalog {
    pub fn product(&self, id: &str) -> Option<CatalogProduct> {
        self.products.lock().unwrap().get(id).cloned()
    }

    pub fn variant(&self, id: &str) -> Option<CatalogVariant> {
        self.variants.lock().unwrap().get(id).cloned()
    }

    pub fn insert_variant(&self, variant: CatalogVariant) {
        self.variants.lock().unwrap().insert(variant.downstream_id.clone(), variant);
    }

    pub fn insert_product(&self, product: CatalogProduct) {
        self.products.lock().unwrap().insert(product.downstream_id.clone(), product);
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalog {
    async fn find_product(&self, downstream_id: &str) -> DomainResult<Option<CatalogProduct>> {
        Ok(self.product(downstream_id))
    }

    async fn upsert_product(&self, product: &CatalogProduct) -> DomainResult<()> {
        self.insert_product(product.clone());
        Ok(())
    }

    async fn find_product_by_upstream_id(
        &self,
        upstream_id: &str,
    ) -> DomainResult<Option<CatalogProduct>> {
        Ok(self
            .products
            .lock()
            .unwrap()
            .values()
            .find(|product| product.upstream_product_id.as_deref() == Some(upstream_id))
            .cloned())
    }

    async fn find_latest_product_by_title(
        &self,
        title_normalized: &str,
    ) -> DomainResult<Option<CatalogProduct>> {
        Ok(self
            .products
            .lock()
            .unwrap()
            .values()
            .filter(|product| product.title_normalized.as_deref() == Some(title_normalized))
            .max_by_key(|product| product.synced_at)
            .cloned())
    }

    async fn find_variant(&self, downstream_id: &str) -> DomainResult<Option<CatalogVariant>> {
        Ok(self.variant(downstream_id))
    }

    async fn upsert_variant(&self, variant: &CatalogVariant) -> DomainResult<()> {
        self.insert_variant(variant.clone());
        Ok(())
    }

    async fn find_variant_by_upstream_id(
        &self,
        upstream_variant_id: &str,
    ) -> DomainResult<Option<CatalogVariant>> {
        Ok(self
            .variants
            .lock()
            .unwrap()
            .values()
            .find(|variant| variant.upstream_variant_id.as_deref() == Some(upstream_variant_id))
            .cloned())
    }
}

/// Queue that keeps everything it is handed for inspection.
#[derive(Default)]
pub struct RecordingQueue {
    ready: Mutex<VecDeque<QueuedTask>>,
    delayed: Mutex<Vec<(QueuedTask, Duration)>>,
}

impl RecordingQueue {
    pub fn ready(&self) -> Vec<QueuedTask> {
        self.ready.lock().unwrap().iter().cloned().collect()
    }

    pub fn delayed(&self) -> Vec<(QueuedTask, Duration)> {
        self.delayed.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskQueue for RecordingQueue {
    async fn enqueue(&self, task: QueuedTask) -> DomainResult<()> {
        self.ready.lock().unwrap().push_back(task);
        Ok(())
    }

    async fn enqueue_after(&self, task: QueuedTask, delay: Duration) -> DomainResult<()> {
        self.delayed.lock().unwrap().push((task, delay));
        Ok(())
    }

    async fn dequeue(&self) -> DomainResult<Option<QueuedTask>> {
        Ok(self.ready.lock().unwrap().pop_front())
    }
}
