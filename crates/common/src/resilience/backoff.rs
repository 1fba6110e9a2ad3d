//! Jittered exponential backoff
//!
//! `delay(n) = min(min(base * 2^(n-1), max) + U[0, round(0.25 * capped)], max)`
//! with `n` clamped to at least 1.

use std::time::Duration;

use rand::Rng;

/// Jitter ceiling as a fraction of the capped delay.
const JITTER_FRACTION: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base_ms: u64,
    max_ms: u64,
}

impl BackoffPolicy {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self { base_ms, max_ms: max_ms.max(base_ms) }
    }

    pub const fn base_ms(&self) -> u64 {
        self.base_ms
    }

    pub const fn max_ms(&self) -> u64 {
        self.max_ms
    }

    /// Deterministic part of the delay, before jitter.
    pub fn floor_ms(&self, attempt: u32) -> u64 {
        let exponent = attempt.max(1) - 1;
        let factor = 2u64.checked_pow(exponent).unwrap_or(u64::MAX);
        self.base_ms.saturating_mul(factor).min(self.max_ms)
    }

    /// Delay for `attempt` using the supplied RNG.
    pub fn delay_ms_with<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> u64 {
        let capped = self.floor_ms(attempt);
        // Jitter bound is at most max/4, well inside f64's exact integer range.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let jitter_ceiling = (capped as f64 * JITTER_FRACTION).round() as u64;
        let jitter = if jitter_ceiling == 0 { 0 } else { rng.gen_range(0..=jitter_ceiling) };
        capped.saturating_add(jitter).min(self.max_ms)
    }

    pub fn delay_ms(&self, attempt: u32) -> u64 {
        self.delay_ms_with(attempt, &mut rand::thread_rng())
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.delay_ms(attempt))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(500, 30_000)
    }
}
