//! Shared test helpers for `storesync-core` integration tests.
//!
//! In-memory implementations of every port plus a [`Harness`] that wires
//! them into the services under test against a [`MockClock`].

#![allow(dead_code)]

pub mod remotes;
pub mod repositories;

use std::sync::Arc;

use storesync_common::{
    CircuitBreaker, CircuitBreakerConfig, KeyValueStore, MemoryKeyValueStore, MockClock,
    RateLimiter,
};
use storesync_core::{
    CatalogueReconciler, CursorStore, EventRecorder, FailureStore, IdempotencyGuard,
    MutationExecutor, MutationSettings, SyncDependencies, SyncOrchestrator, SyncSettings,
};

pub use remotes::{FakeDownstream, FakeUpstream};
pub use repositories::{
    InMemoryCatalog, InMemoryCursors, InMemoryEvents, InMemoryFailures, InMemoryRequestAudit,
    InMemorySyncRuns, RecordingQueue,
};

/// Every in-memory collaborator, shared by the services built from it.
pub struct Harness {
    pub clock: Arc<MockClock>,
    pub kv: Arc<MemoryKeyValueStore>,
    pub runs: Arc<InMemorySyncRuns>,
    pub audit: Arc<InMemoryRequestAudit>,
    pub events: Arc<InMemoryEvents>,
    pub cursors: Arc<InMemoryCursors>,
    pub failures: Arc<InMemoryFailures>,
    pub catalog: Arc<InMemoryCatalog>,
    pub queue: Arc<RecordingQueue>,
    pub upstream: Arc<FakeUpstream>,
    pub downstream: Arc<FakeDownstream>,
}

impl Harness {
    pub fn new() -> Self {
        let clock = Arc::new(MockClock::new());
        let audit = Arc::new(InMemoryRequestAudit::default());
        Self {
            kv: Arc::new(MemoryKeyValueStore::with_clock(clock.clone())),
            runs: Arc::default(),
            events: Arc::default(),
            cursors: Arc::default(),
            failures: Arc::default(),
            catalog: Arc::default(),
            queue: Arc::default(),
            upstream: Arc::default(),
            downstream: Arc::new(FakeDownstream::auditing(audit.clone(), clock.clone())),
            audit,
            clock,
        }
    }

    pub fn kv_store(&self) -> Arc<dyn KeyValueStore> {
        self.kv.clone()
    }

    pub fn recorder(&self) -> EventRecorder {
        EventRecorder::new(self.events.clone(), self.clock.clone())
    }

    pub fn failure_store(&self) -> FailureStore {
        FailureStore::new(self.failures.clone(), self.clock.clone())
    }

    pub fn breaker(&self) -> CircuitBreaker {
        CircuitBreaker::new(self.kv_store(), CircuitBreakerConfig::default())
    }

    pub fn reconciler(&self) -> CatalogueReconciler {
        CatalogueReconciler::new(self.catalog.clone(), self.clock.clone())
    }

    pub fn executor(&self, settings: MutationSettings) -> MutationExecutor {
        MutationExecutor::new(
            self.downstream.clone(),
            IdempotencyGuard::new(self.audit.clone()),
            self.breaker(),
            RateLimiter::with_clock(self.kv_store(), self.clock.clone()),
            self.recorder(),
            self.failure_store(),
        )
        .with_settings(settings)
    }

    pub fn orchestrator(&self, settings: SyncSettings) -> SyncOrchestrator {
        SyncOrchestrator::new(
            SyncDependencies {
                upstream: self.upstream.clone(),
                downstream: self.downstream.clone(),
                runs: self.runs.clone(),
                cursors: CursorStore::new(self.cursors.clone(), self.clock.clone()),
                reconciler: self.reconciler(),
                events: self.recorder(),
                failures: self.failure_store(),
                queue: self.queue.clone(),
                clock: self.clock.clone(),
            },
            settings,
        )
    }
}
