//! Run coordination: cursors, orchestrated syncs and health reporting

pub mod cursor;
pub mod health;
pub mod orchestrator;
pub mod ports;

pub use cursor::CursorStore;
pub use health::{HealthReport, HealthReporter};
pub use orchestrator::{
    CatalogueSyncRequest, FullSyncOutcome, OrderSyncSummary, ProductSyncRequest, SyncDependencies,
    SyncOrchestrator, SyncSettings,
};
pub use ports::{CursorRepository, SyncRunRepository};
