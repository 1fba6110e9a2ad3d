//! Structured run timeline
//!
//! Every persisted [`IntegrationEvent`] is mirrored to `tracing` at the
//! matching level so log pipelines see the same timeline as the database.

use std::sync::Arc;

use serde_json::Value;
use storesync_common::Clock;
use storesync_domain::{new_record_id, EventLevel, EventType, IntegrationEvent, Result};
use tracing::{error, info, warn};

use super::ports::EventRepository;

#[derive(Clone)]
pub struct EventRecorder {
    repository: Arc<dyn EventRepository>,
    clock: Arc<dyn Clock>,
}

impl EventRecorder {
    pub fn new(repository: Arc<dyn EventRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Append one event to `run_id`'s timeline.
    pub async fn record(
        &self,
        run_id: &str,
        event_type: EventType,
        payload: Value,
        ref_id: Option<&str>,
        level: EventLevel,
    ) -> Result<IntegrationEvent> {
        let event = IntegrationEvent {
            id: new_record_id(),
            run_id: run_id.to_string(),
            event_type,
            ref_id: ref_id.map(str::to_string),
            payload,
            level,
            created_at: self.clock.now(),
        };

        self.repository.append(&event).await?;
        trace_event(&event);
        Ok(event)
    }

    pub async fn info(
        &self,
        run_id: &str,
        event_type: EventType,
        payload: Value,
        ref_id: Option<&str>,
    ) -> Result<IntegrationEvent> {
        self.record(run_id, event_type, payload, ref_id, EventLevel::Info).await
    }

    pub async fn warning(
        &self,
        run_id: &str,
        event_type: EventType,
        payload: Value,
        ref_id: Option<&str>,
    ) -> Result<IntegrationEvent> {
        self.record(run_id, event_type, payload, ref_id, EventLevel::Warning).await
    }

    pub async fn error(
        &self,
        run_id: &str,
        event_type: EventType,
        payload: Value,
        ref_id: Option<&str>,
    ) -> Result<IntegrationEvent> {
        self.record(run_id, event_type, payload, ref_id, EventLevel::Error).await
    }
}

impl std::fmt::Debug for EventRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRecorder").finish_non_exhaustive()
    }
}

fn trace_event(event: &IntegrationEvent) {
    let ref_id = event.ref_id.as_deref().unwrap_or("-");
    match event.level {
        EventLevel::Info => info!(
            run_id = %event.run_id,
            event_type = %event.event_type,
            ref_id,
            payload = %event.payload,
            "integration event"
        ),
        EventLevel::Warning => warn!(
            run_id = %event.run_id,
            event_type = %event.event_type,
            ref_id,
            payload = %event.payload,
            "integration event"
        ),
        EventLevel::Error => error!(
            run_id = %event.run_id,
            event_type = %event.event_type,
            ref_id,
            payload = %event.payload,
            "integration event"
        ),
    }
}
