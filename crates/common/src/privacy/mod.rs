//! Privacy Module
//!
//! Redaction applied to outbound request audit rows before they are
//! persisted: credential headers, contact-number fields in bodies, and body
//! size limits.

pub mod sanitizer;

pub use sanitizer::{audit_body, sanitize_body, sanitize_headers, truncate_utf8};
