//! Duplicate-mutation detection against the local request audit log
//!
//! The remote system is never asked whether a mutation landed; a prior
//! `success` attempt with the same key and driver is the only evidence.

use std::sync::Arc;

use storesync_common::idempotency_key;
use storesync_domain::{Driver, MutationTask, Result};
use tracing::debug;

use super::ports::RequestAuditRepository;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdempotencyDecision {
    /// No prior success; issue the call with this key.
    Proceed { key: String },
    /// A prior attempt with this key succeeded.
    AlreadyApplied { key: String },
}

impl IdempotencyDecision {
    pub fn key(&self) -> &str {
        match self {
            Self::Proceed { key } | Self::AlreadyApplied { key } => key,
        }
    }

    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::AlreadyApplied { .. })
    }
}

#[derive(Clone)]
pub struct IdempotencyGuard {
    audit: Arc<dyn RequestAuditRepository>,
}

impl IdempotencyGuard {
    pub fn new(audit: Arc<dyn RequestAuditRepository>) -> Self {
        Self { audit }
    }

    /// Deterministic key for a downstream mutation task.
    pub fn key_for(task: &MutationTask) -> String {
        idempotency_key(&task.fingerprint())
    }

    pub async fn check(&self, driver: Driver, key: &str) -> Result<IdempotencyDecision> {
        let key = key.to_string();
        if self.audit.has_success(driver, &key).await? {
            debug!(%driver, idempotency_key = %key, "prior success found");
            return Ok(IdempotencyDecision::AlreadyApplied { key });
        }
        Ok(IdempotencyDecision::Proceed { key })
    }

    pub async fn check_task(&self, task: &MutationTask) -> Result<IdempotencyDecision> {
        self.check(Driver::Downstream, &Self::key_for(task)).await
    }
}

impl std::fmt::Debug for IdempotencyGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdempotencyGuard").finish_non_exhaustive()
    }
}
