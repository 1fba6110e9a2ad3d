//! # StoreSync Domain
//!
//! Business domain types and models for StoreSync.
//!
//! This crate contains:
//! - Persisted records (sync runs, request audit rows, events, failures)
//! - Boundary DTOs for the upstream and downstream platforms
//! - Domain error types and Result definitions
//! - Configuration structures and defaults
//!
//! ## Architecture
//! - No dependencies on other StoreSync crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
