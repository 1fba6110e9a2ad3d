//! SQLite persistence for the sync engine

mod codec;

pub mod catalog_repository;
pub mod cursor_repository;
pub mod event_repository;
pub mod failure_repository;
pub mod kv_store;
pub mod manager;
pub mod request_audit_repository;
pub mod sync_run_repository;

pub use catalog_repository::SqliteCatalogRepository;
pub use cursor_repository::SqliteCursorRepository;
pub use event_repository::SqliteEventRepository;
pub use failure_repository::SqliteFailureRepository;
pub use kv_store::SqliteKeyValueStore;
pub use manager::{DbConnection, DbManager};
pub use request_audit_repository::SqliteRequestAuditRepository;
pub use sync_run_repository::SqliteSyncRunRepository;
