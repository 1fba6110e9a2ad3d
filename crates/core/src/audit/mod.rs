//! Request audit trail and run timeline

pub mod events;
pub mod idempotency;
pub mod ports;

pub use events::EventRecorder;
pub use idempotency::{IdempotencyDecision, IdempotencyGuard};
pub use ports::{EventRepository, RequestAuditRepository};
