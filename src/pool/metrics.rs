//! Process-wide connection counters and the periodic reporter.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use super::shutdown_requested;

/// Shared counters updated atomically by every worker.
///
/// Counters are independent; a [`snapshot`](Metrics::snapshot) is not atomic
/// across fields.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Connections successfully established.
    opened: AtomicU64,
    /// Successful AUTH replies.
    authed: AtomicU64,
    /// Successful PING replies.
    pongs: AtomicU64,
    /// Dial, handshake and keepalive failures.
    errors: AtomicU64,
    /// Completed steady-state lifecycles, including idle recycles.
    restarts: AtomicU64,
    /// Connections currently held open.
    active: AtomicI64,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub opened: u64,
    pub authed: u64,
    pub pongs: u64,
    pub errors: u64,
    pub restarts: u64,
    pub active: i64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a newly established connection.
    ///
    /// `active` stays incremented until the returned guard is dropped, so it
    /// is decremented exactly once per connection whichever path closes it.
    pub fn connection_opened(self: &Arc<Self>) -> ActiveConnection {
        self.opened.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
        ActiveConnection {
            metrics: Arc::clone(self),
        }
    }

    pub fn record_auth(&self) {
        self.authed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pong(&self) {
        self.pongs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_restart(&self) {
        self.restarts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn restarts(&self) -> u64 {
        self.restarts.load(Ordering::Relaxed)
    }

    pub fn active(&self) -> i64 {
        self.active.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            opened: self.opened.load(Ordering::Relaxed),
            authed: self.authed.load(Ordering::Relaxed),
            pongs: self.pongs.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
            active: self.active.load(Ordering::Relaxed),
        }
    }
}

/// Keeps one connection counted in `active`.
#[derive(Debug)]
pub struct ActiveConnection {
    metrics: Arc<Metrics>,
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.metrics.active.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Log a snapshot every `interval` until shutdown, then log a final one.
pub fn spawn_reporter(
    metrics: Arc<Metrics>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let started = Instant::now();
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                _ = ticker.tick() => report(&metrics.snapshot(), started.elapsed(), "metrics"),
            }
        }

        report(&metrics.snapshot(), started.elapsed(), "final metrics");
    })
}

fn report(snapshot: &MetricsSnapshot, uptime: Duration, message: &'static str) {
    let uptime = humantime::format_duration(Duration::from_secs(uptime.as_secs()));
    info!(
        uptime = %uptime,
        active = snapshot.active,
        opened = snapshot.opened,
        authed = snapshot.authed,
        pongs = snapshot.pongs,
        errors = snapshot.errors,
        restarts = snapshot.restarts,
        "{message}"
    );
}
