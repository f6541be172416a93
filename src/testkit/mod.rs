//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`server`] — `FakeKvServer`, a loopback RESP server with counters.
//! - [`config`] — Canonical fast test configurations.

pub mod config;
pub mod server;

use std::time::Duration;

use tokio::time::{sleep, Instant};

/// Poll `condition` every 5ms until it holds, panicking after `limit`.
pub async fn wait_until<F: FnMut() -> bool>(limit: Duration, mut condition: F) {
    let deadline = Instant::now() + limit;
    while !condition() {
        assert!(
            Instant::now() < deadline,
            "condition not met within {limit:?}"
        );
        sleep(Duration::from_millis(5)).await;
    }
}
