//! Burst limiter for new connection attempts.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::trace;

use super::shutdown_requested;

/// Token bucket of fixed capacity, refilled to the brim once per window.
///
/// The bucket starts full, so the first window begins at construction.
#[derive(Debug)]
pub struct BurstLimiter {
    tokens: Semaphore,
    capacity: usize,
    window: Duration,
}

impl BurstLimiter {
    /// `capacity` admissions per second.
    pub fn new(capacity: usize) -> Self {
        Self::with_window(capacity, Duration::from_secs(1))
    }

    pub fn with_window(capacity: usize, window: Duration) -> Self {
        let capacity = capacity.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            tokens: Semaphore::new(capacity),
            capacity,
            window,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Wait for one admission. The token is consumed, not returned.
    pub async fn admit(&self) {
        if let Ok(permit) = self.tokens.acquire().await {
            permit.forget();
        }
    }

    /// Take an admission if one is available right now.
    #[cfg(test)]
    pub fn try_admit(&self) -> bool {
        match self.tokens.try_acquire() {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    /// Top the bucket back up to capacity.
    pub fn refill(&self) {
        let missing = self.capacity.saturating_sub(self.tokens.available_permits());
        if missing > 0 {
            self.tokens.add_permits(missing);
            trace!(added = missing, "Limiter refilled");
        }
    }

    /// Refill once per window until shutdown.
    pub fn spawn_refill(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + limiter.window;
            let mut ticker = tokio::time::interval_at(start, limiter.window);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown_requested(&mut shutdown) => break,
                    _ = ticker.tick() => limiter.refill(),
                }
            }
        })
    }
}
