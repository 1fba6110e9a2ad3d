//! Modular common utilities shared across StoreSync crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: backoff math, payload sanitisation, text and hashing
//!   helpers
//! - `runtime`: async building blocks (clock, key-value store, circuit
//!   breaker, rate limiter)
//! - `observability`: tracing for the runtime modules

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod privacy;
#[cfg(feature = "foundation")]
pub mod utils;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod kv;
#[cfg(feature = "runtime")]
pub mod resilience;
#[cfg(feature = "runtime")]
pub mod time;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use kv::{KeyValueStore, KvError, KvResult, MemoryKeyValueStore};
#[cfg(feature = "foundation")]
pub use privacy::sanitizer::{audit_body, sanitize_body, sanitize_headers, truncate_utf8};
#[cfg(feature = "runtime")]
pub use resilience::{
    BackoffPolicy, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder,
    CircuitState, ConfigError, RateLimiter,
};
#[cfg(feature = "runtime")]
pub use time::{Clock, MockClock, SystemClock};
#[cfg(feature = "foundation")]
pub use utils::hashing::{idempotency_key, sha256_hex};
#[cfg(feature = "foundation")]
pub use utils::title::normalize_title;
