//! Configuration structures
//!
//! Every section defaults independently so partial files and environment
//! overrides stay valid.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_MAX_MS, DEFAULT_CIRCUIT_EVALUATION_SECS,
    DEFAULT_CIRCUIT_FAILURE_THRESHOLD, DEFAULT_CIRCUIT_OPEN_SECS, DEFAULT_DOWNSTREAM_PAGE_SIZE,
    DEFAULT_HTTP_MAX_RETRIES, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_RATE_LIMIT_PER_MINUTE,
    DEFAULT_UPSTREAM_PAGE_LIMIT, DEFAULT_UPSTREAM_SINCE_MS, FAILURE_MAX_ATTEMPTS,
    FAILURE_RETRY_BATCH_SIZE, FAILURE_RETRY_DELAY_SECS,
};
use crate::types::OrderCreateDto;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub upstream: UpstreamConfig,
    pub downstream: DownstreamConfig,
    pub http: HttpConfig,
    pub circuit: CircuitConfig,
    pub retry: FailureRetryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "storesync.db".into(), pool_size: 8 }
    }
}

/// Upstream (source-of-truth) platform settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    pub enabled: bool,
    pub base_url: String,
    pub token: Option<String>,
    pub page_limit: u32,
    pub orders_page_limit: Option<u32>,
    /// Negative values are offsets from "now", interpreted by the upstream API.
    pub since_ms: i64,
    /// Order drafts submitted on every product run.
    pub pending_orders: Vec<OrderCreateDto>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost/upstream/".into(),
            token: None,
            page_limit: DEFAULT_UPSTREAM_PAGE_LIMIT,
            orders_page_limit: None,
            since_ms: DEFAULT_UPSTREAM_SINCE_MS,
            pending_orders: Vec::new(),
        }
    }
}

/// Downstream storefront settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DownstreamConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: Option<String>,
    pub rate_limit_per_minute: u32,
    pub page_size: u32,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost/downstream/".into(),
            api_key: None,
            rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
            page_size: DEFAULT_DOWNSTREAM_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub retries: u32,
    pub retry_backoff_ms: u64,
    pub retry_backoff_max_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            retries: DEFAULT_HTTP_MAX_RETRIES,
            retry_backoff_ms: DEFAULT_BACKOFF_BASE_MS,
            retry_backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CircuitConfig {
    pub failure_threshold: u32,
    pub evaluation_secs: u64,
    pub open_secs: u64,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_CIRCUIT_FAILURE_THRESHOLD,
            evaluation_secs: DEFAULT_CIRCUIT_EVALUATION_SECS,
            open_secs: DEFAULT_CIRCUIT_OPEN_SECS,
        }
    }
}

/// Failure store and retry scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FailureRetryConfig {
    pub max_attempts: u32,
    pub delay_secs: i64,
    pub batch_size: usize,
    pub interval_secs: u64,
}

impl Default for FailureRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: FAILURE_MAX_ATTEMPTS,
            delay_secs: FAILURE_RETRY_DELAY_SECS,
            batch_size: FAILURE_RETRY_BATCH_SIZE,
            interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `storesync_core=debug`.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into(), json: false }
    }
}
