//! Downstream catalogue projection: reconciliation and write operations

pub mod ports;
pub mod reconciler;
pub mod writer;

pub use ports::CatalogRepository;
pub use reconciler::{
    extract_external_references, resolve_external_id, CatalogueReconciler, ReconcileSummary,
};
pub use writer::{CatalogueWriter, OrderOperation};
