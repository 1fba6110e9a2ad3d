//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Backoff
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 500;
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;

// Circuit breaker
pub const DEFAULT_CIRCUIT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_CIRCUIT_EVALUATION_SECS: u64 = 60;
pub const DEFAULT_CIRCUIT_OPEN_SECS: u64 = 45;

// Outbound HTTP
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_HTTP_MAX_RETRIES: u32 = 3;
pub const MAX_AUDIT_BODY_BYTES: usize = 65_536;
pub const REDACTED: &str = "***";

// Rate limiting
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 240;
pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;
pub const RATE_LIMITED_RELEASE_SECS: u64 = 10;
pub const CIRCUIT_OPEN_RELEASE_SECS: u64 = 30;

// Failure store / retry scheduler
pub const FAILURE_RETRY_DELAY_SECS: i64 = 300;
pub const FAILURE_MAX_ATTEMPTS: u32 = 10;
pub const FAILURE_RETRY_BATCH_SIZE: usize = 100;
pub const MUTATION_TASK_MAX_TRIES: u32 = 5;

// Pagination
pub const DEFAULT_UPSTREAM_PAGE_LIMIT: u32 = 25;
pub const DEFAULT_UPSTREAM_SINCE_MS: i64 = -120_000;
pub const DEFAULT_DOWNSTREAM_PAGE_SIZE: u32 = 100;

// Service keys shared by the circuit breaker, rate limiter and health report
pub const UPSTREAM_SERVICE: &str = "upstream";
pub const DOWNSTREAM_SERVICE: &str = "downstream";

// Cursor keys
pub const CURSOR_PRODUCTS_PAGE: &str = "products.page";
pub const CURSOR_PRODUCTS_SINCE: &str = "products.since";
pub const CURSOR_DOWNSTREAM_PRODUCTS_PAGE: &str = "downstream.products.page";

// Run scopes
pub const SCOPE_INCREMENTAL: &str = "incremental";
pub const SCOPE_DOWNSTREAM_PRODUCTS: &str = "downstream-products";
