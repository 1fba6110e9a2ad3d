//! Outbound request audit records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Remote services the engine talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Driver {
    Upstream,
    Downstream,
}

crate::impl_wire_conversions!(Driver {
    Upstream => "UPSTREAM",
    Downstream => "DOWNSTREAM",
});

impl Driver {
    /// Key used for circuit-breaker and rate-limiter buckets.
    pub const fn service_key(self) -> &'static str {
        match self {
            Self::Upstream => crate::constants::UPSTREAM_SERVICE,
            Self::Downstream => crate::constants::DOWNSTREAM_SERVICE,
        }
    }
}

/// Classification of a single attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    Success,
    Fail,
    Retry,
    CircuitOpen,
    Timeout,
}

crate::impl_wire_conversions!(RequestOutcome {
    Success => "success",
    Fail => "fail",
    Retry => "retry",
    CircuitOpen => "circuit_open",
    Timeout => "timeout",
});

/// One outbound HTTP attempt. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalRequestRecord {
    pub id: String,
    pub run_id: Option<String>,
    pub driver: Driver,
    pub method: String,
    pub url: String,
    pub query: Option<Value>,
    pub request_headers: Option<Value>,
    pub request_body: Option<Value>,
    pub response_status: Option<u16>,
    pub response_headers: Option<Value>,
    pub response_body: Option<Value>,
    pub duration_ms: Option<i64>,
    pub attempt: u32,
    pub outcome: RequestOutcome,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}
