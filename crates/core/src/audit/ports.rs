//! Port interfaces for the append-only audit tables

use async_trait::async_trait;
use storesync_domain::{Driver, ExternalRequestRecord, IntegrationEvent, Result};

/// Persists every outbound attempt.
#[async_trait]
pub trait RequestAuditRepository: Send + Sync {
    /// Append one attempt. Records are never updated afterwards.
    async fn record(&self, record: &ExternalRequestRecord) -> Result<()>;

    /// Whether an attempt with this key already succeeded against `driver`.
    async fn has_success(&self, driver: Driver, idempotency_key: &str) -> Result<bool>;

    /// All attempts carrying `idempotency_key`, oldest first.
    async fn find_by_idempotency_key(&self, idempotency_key: &str)
        -> Result<Vec<ExternalRequestRecord>>;

    /// Attempts made on behalf of a run, oldest first.
    async fn list_for_run(&self, run_id: &str) -> Result<Vec<ExternalRequestRecord>>;
}

/// Persists the integration event timeline.
#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn append(&self, event: &IntegrationEvent) -> Result<()>;

    /// Events of a run in creation order.
    async fn list_for_run(&self, run_id: &str) -> Result<Vec<IntegrationEvent>>;
}
