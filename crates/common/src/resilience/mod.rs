//! Resilience patterns for outbound integrations
//!
//! - [`BackoffPolicy`]: jittered exponential delay per attempt
//! - [`CircuitBreaker`]: shared, TTL-based failure gate per service
//! - [`RateLimiter`]: fixed-window counter per service per minute
//!
//! The breaker and the limiter keep their state in a
//! [`KeyValueStore`](crate::kv::KeyValueStore) so that every worker reading
//! the same store sees the same decisions.

pub mod backoff;
pub mod circuit_breaker;
pub mod rate_limiter;

pub use backoff::BackoffPolicy;
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitState, ConfigError,
};
pub use rate_limiter::RateLimiter;
