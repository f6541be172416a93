//! Exponential reconnect delay with jitter.

use std::time::Duration;

use rand::Rng;

/// Relative jitter applied to backoff delays (±20 %).
pub const BACKOFF_JITTER: f64 = 0.2;

/// Retry counts wrap at this window so delays stop growing on long runs.
pub const RETRY_WINDOW: u32 = 10;

/// Used when the configured minimum is zero.
const FALLBACK_MIN: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    min: Duration,
    max: Duration,
}

impl Backoff {
    /// A zero `min` falls back to 100ms; a `max` below `min` becomes
    /// `min * 10`.
    pub fn new(min: Duration, max: Duration) -> Self {
        let min = if min.is_zero() { FALLBACK_MIN } else { min };
        let max = if max < min { min.saturating_mul(10) } else { max };
        Self { min, max }
    }

    /// Un-jittered delay: `min * 2^retry`, capped at `max`.
    pub fn base(&self, retry: u32) -> Duration {
        1u32.checked_shl(retry)
            .and_then(|factor| self.min.checked_mul(factor))
            .map_or(self.max, |d| d.min(self.max))
    }

    /// Delay for `retry`, with the retry count folded into [`RETRY_WINDOW`].
    pub fn delay(&self, retry: u32) -> Duration {
        jitter(self.base(retry % RETRY_WINDOW), BACKOFF_JITTER)
    }
}

/// Scale `d` by a uniform factor in `[1 - pct, 1 + pct]`.
pub fn jitter(d: Duration, pct: f64) -> Duration {
    if d.is_zero() || pct <= 0.0 {
        return d;
    }
    let factor = 1.0 + rand::thread_rng().gen_range(-pct..=pct);
    d.mul_f64(factor.max(0.0))
}
