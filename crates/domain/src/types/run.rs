//! Sync run lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Result, StoreSyncError};

/// Status of a synchronization attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Success,
    Partial,
    Failed,
}

crate::impl_wire_conversions!(RunStatus {
    Pending => "pending",
    Running => "running",
    Success => "success",
    Partial => "partial",
    Failed => "failed",
});

impl RunStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// One synchronization attempt, owned by a single orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: String,
    pub status: RunStatus,
    pub scope: String,
    pub since_ms: Option<i64>,
    pub page: u32,
    pub pages_total: Option<u32>,
    pub totals: Option<Map<String, Value>>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SyncRun {
    /// Create a run already in `running` state.
    pub fn start(scope: impl Into<String>, page: u32, since_ms: Option<i64>, now: DateTime<Utc>) -> Self {
        Self {
            id: super::new_record_id(),
            status: RunStatus::Running,
            scope: scope.into(),
            since_ms,
            page,
            pages_total: None,
            totals: None,
            error_message: None,
            started_at: Some(now),
            finished_at: None,
            created_at: now,
        }
    }

    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn mark_success(
        &mut self,
        now: DateTime<Utc>,
        page: u32,
        pages_total: Option<u32>,
        totals: Map<String, Value>,
    ) -> Result<()> {
        self.ensure_open()?;
        self.status = RunStatus::Success;
        self.finished_at = Some(now);
        self.page = page;
        self.pages_total = pages_total;
        self.totals = Some(totals);
        Ok(())
    }

    pub fn mark_failed(&mut self, now: DateTime<Utc>, message: impl Into<String>) -> Result<()> {
        self.ensure_open()?;
        self.status = RunStatus::Failed;
        self.finished_at = Some(now);
        self.error_message = Some(message.into());
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_terminal() {
            return Err(StoreSyncError::InvalidInput(format!(
                "sync run {} is already {}",
                self.id, self.status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_runs_reject_further_transitions() {
        let now = Utc::now();
        let mut run = SyncRun::start("incremental", 1, Some(0), now);
        assert_eq!(run.status, RunStatus::Running);

        run.mark_success(now, 2, Some(4), Map::new()).unwrap();
        assert!(run.is_terminal());
        assert_eq!(run.page, 2);

        let err = run.mark_failed(now, "late failure").unwrap_err();
        assert!(matches!(err, StoreSyncError::InvalidInput(_)));
        assert_eq!(run.status, RunStatus::Success);
        assert!(run.error_message.is_none());
    }

    #[test]
    fn partial_is_not_terminal() {
        assert!(!RunStatus::Partial.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert_eq!("SUCCESS".parse::<RunStatus>().unwrap(), RunStatus::Success);
    }
}
