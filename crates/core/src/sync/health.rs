use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use storesync_common::CircuitBreaker;
use storesync_domain::constants::{DOWNSTREAM_SERVICE, UPSTREAM_SERVICE};
use storesync_domain::{Result, SyncRun};

use super::ports::SyncRunRepository;
use crate::errors::map_kv_error;
use crate::failures::FailureStore;

/// Snapshot of the engine's operational state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub latest_run: Option<SyncRun>,
    pub pending_failures: u64,
    /// Circuit state per remote service.
    pub circuits: BTreeMap<String, String>,
}

#[derive(Clone)]
pub struct HealthReporter {
    runs: Arc<dyn SyncRunRepository>,
    failures: FailureStore,
    breaker: CircuitBreaker,
}

impl HealthReporter {
    pub fn new(runs: Arc<dyn SyncRunRepository>, failures: FailureStore, breaker: CircuitBreaker) -> Self {
        Self { runs, failures, breaker }
    }

    pub async fn report(&self) -> Result<HealthReport> {
        let latest_run = self.runs.latest().await?;
        let pending_failures = self.failures.pending_count().await?;

        let mut circuits = BTreeMap::new();
        for service in [UPSTREAM_SERVICE, DOWNSTREAM_SERVICE] {
            let state = self.breaker.state(service).await.map_err(map_kv_error)?;
            circuits.insert(service.to_string(), state.as_str().to_string());
        }

        Ok(HealthReport { latest_run, pending_failures, circuits })
    }
}

impl std::fmt::Debug for HealthReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthReporter").finish_non_exhaustive()
    }
}
