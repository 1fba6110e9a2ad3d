//! # StoreSync Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - The mutation pipeline (idempotency, circuit, rate limit, execution)
//! - Catalogue reconciliation between upstream and downstream identifiers
//! - Durable failures and the retry pass that replays them
//! - Run orchestration, cursors and health reporting
//! - Port/adapter interfaces (traits)
//!
//! ## Architecture Principles
//! - Only depends on `storesync-common` and `storesync-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod audit;
pub mod catalog;
pub mod errors;
pub mod failures;
pub mod mutation;
pub mod sync;

// Remote platform ports
pub mod remote_ports;

// Re-export specific items to avoid ambiguity
pub use audit::ports::{EventRepository, RequestAuditRepository};
pub use audit::{EventRecorder, IdempotencyDecision, IdempotencyGuard};
pub use catalog::ports::CatalogRepository;
pub use catalog::{CatalogueReconciler, CatalogueWriter, OrderOperation, ReconcileSummary};
pub use failures::ports::{FailureRepository, FailureUpsert};
pub use failures::{FailureStore, RetryPassSummary, RetryScheduler};
pub use mutation::ports::TaskQueue;
pub use mutation::{MutationExecutor, MutationSettings, QueuedTask, TaskOutcome};
pub use remote_ports::{DownstreamApi, RequestContext, UpstreamApi};
pub use sync::ports::{CursorRepository, SyncRunRepository};
pub use sync::{
    CatalogueSyncRequest, CursorStore, FullSyncOutcome, HealthReport, HealthReporter,
    OrderSyncSummary, ProductSyncRequest, SyncDependencies, SyncOrchestrator, SyncSettings,
};
