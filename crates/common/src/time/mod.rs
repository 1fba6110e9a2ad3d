//! Time utilities and abstractions
//!
//! Wall-clock access goes through [`Clock`] so TTL expiry, minute buckets and
//! retry schedules can be driven deterministically in tests.
//!
//! ```rust
//! use std::time::Duration;
//!
//! use storesync_common::time::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let before = clock.now();
//! clock.advance(Duration::from_secs(5));
//! assert_eq!((clock.now() - before).num_seconds(), 5);
//! ```

pub mod clock;

pub use clock::{Clock, MockClock, SystemClock};
