//! # StoreSync Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - SQLite persistence (repositories and the shared key-value store)
//! - The retrying, audited HTTP transport and both platform clients
//! - The in-process task queue and worker pool
//! - Background schedulers, scope leases, configuration and tracing setup
//!
//! ## Architecture
//! - Implements traits defined in `storesync-core`
//! - Depends on `storesync-common`, `storesync-domain` and `storesync-core`
//! - Contains all "impure" code (I/O, network, filesystem)

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod observability;
pub mod queue;
pub mod scheduling;
pub mod scope_lock;

// Re-export commonly used items
pub use database::{
    DbManager, SqliteCatalogRepository, SqliteCursorRepository, SqliteEventRepository,
    SqliteFailureRepository, SqliteKeyValueStore, SqliteRequestAuditRepository,
    SqliteSyncRunRepository,
};
pub use errors::InfraError;
pub use http::{DownstreamClient, RetryingTransport, UpstreamClient};
pub use observability::init_tracing;
pub use queue::{InMemoryTaskQueue, WorkerPool, WorkerPoolConfig};
pub use scheduling::{FailureRetryScheduler, FailureRetrySchedulerConfig, SchedulerError};
pub use scope_lock::ScopeLock;
