//! Common utility functions
//!
//! - **[`hashing`]**: idempotency keys derived from mutation fingerprints
//! - **[`title`]**: title normalisation used for catalogue lookups

pub mod hashing;
pub mod title;

pub use self::hashing::{idempotency_key, sha256_hex};
pub use self::title::normalize_title;
