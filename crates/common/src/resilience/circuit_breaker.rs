//! Per-service circuit breaker over a shared key-value store
//!
//! State and the rolling failure counter live in the store under
//! `circuit:{key}:state` and `circuit:{key}:failures`, so every worker
//! sharing the backend observes the same circuit.
//!
//! Transitions:
//! - `closed` → `open` once the failure counter reaches the threshold inside
//!   the evaluation window; the open state expires after the cool-down and
//!   callers then read the circuit as closed again.
//! - `half_open` is only entered through
//!   [`CircuitBreaker::transition_half_open`].
//! - any recorded success clears the counter and stores `closed`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::kv::{KeyValueStore, KvResult};

/// Simple configuration error for validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid circuit breaker configuration: {0}")]
pub struct ConfigError(pub String);

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CircuitState {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "closed" => Ok(Self::Closed),
            "open" => Ok(Self::Open),
            "half_open" | "half-open" => Ok(Self::HalfOpen),
            other => Err(ConfigError(format!("unknown circuit state '{other}'"))),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Failures inside the window that open the circuit
    pub failure_threshold: u32,
    /// Rolling TTL of the failure counter
    pub evaluation_window: Duration,
    /// How long the circuit stays open
    pub open_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            evaluation_window: Duration::from_secs(60),
            open_duration: Duration::from_secs(45),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError("failure_threshold must be greater than 0".into()));
        }
        if self.evaluation_window.is_zero() {
            return Err(ConfigError("evaluation_window must be greater than zero".into()));
        }
        if self.open_duration.is_zero() {
            return Err(ConfigError("open_duration must be greater than zero".into()));
        }
        Ok(())
    }
}

/// Builder for [`CircuitBreakerConfig`]
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn evaluation_window(mut self, window: Duration) -> Self {
        self.config.evaluation_window = window;
        self
    }

    pub fn open_duration(mut self, duration: Duration) -> Self {
        self.config.open_duration = duration;
        self
    }

    pub fn build(self) -> Result<CircuitBreakerConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Failure-counting gate keyed by service name.
#[derive(Clone)]
pub struct CircuitBreaker {
    store: Arc<dyn KeyValueStore>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(store: Arc<dyn KeyValueStore>, config: CircuitBreakerConfig) -> Self {
        Self { store, config }
    }

    pub fn with_defaults(store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(store, CircuitBreakerConfig::default())
    }

    pub const fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn failures_key(key: &str) -> String {
        format!("circuit:{key}:failures")
    }

    fn state_key(key: &str) -> String {
        format!("circuit:{key}:state")
    }

    /// Count one failure; opens the circuit when the threshold is reached.
    /// Returns the resulting state.
    #[instrument(skip(self))]
    pub async fn record_failure(&self, key: &str) -> KvResult<CircuitState> {
        let failures =
            self.store.increment(&Self::failures_key(key), self.config.evaluation_window).await?;

        if failures >= u64::from(self.config.failure_threshold) {
            self.store
                .put(
                    &Self::state_key(key),
                    CircuitState::Open.as_str(),
                    Some(self.config.open_duration),
                )
                .await?;
            warn!(service = key, failures, "circuit opened");
            return Ok(CircuitState::Open);
        }

        debug!(service = key, failures, "circuit failure recorded");
        self.state(key).await
    }

    #[instrument(skip(self))]
    pub async fn record_success(&self, key: &str) -> KvResult<()> {
        self.store.forget(&Self::failures_key(key)).await?;
        self.store
            .put(
                &Self::state_key(key),
                CircuitState::Closed.as_str(),
                Some(self.config.evaluation_window),
            )
            .await
    }

    /// Stored state, `closed` when nothing (or garbage) is stored.
    pub async fn state(&self, key: &str) -> KvResult<CircuitState> {
        let stored = self.store.get(&Self::state_key(key)).await?;
        Ok(stored.and_then(|raw| raw.parse().ok()).unwrap_or(CircuitState::Closed))
    }

    pub async fn is_open(&self, key: &str) -> KvResult<bool> {
        Ok(self.state(key).await? == CircuitState::Open)
    }

    /// Let a caller probe recovery explicitly.
    pub async fn transition_half_open(&self, key: &str) -> KvResult<()> {
        info!(service = key, "circuit half-open");
        self.store
            .put(
                &Self::state_key(key),
                CircuitState::HalfOpen.as_str(),
                Some(self.config.evaluation_window),
            )
            .await
    }

    /// Failures counted in the current window.
    pub async fn failure_count(&self, key: &str) -> KvResult<u64> {
        self.store.count(&Self::failures_key(key)).await
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker").field("config", &self.config).finish_non_exhaustive()
    }
}
