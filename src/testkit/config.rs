//! Canonical test configurations.
//!
//! Single source of truth for the timings tests run with, so scenarios finish
//! in milliseconds instead of the production defaults' minutes.

use std::time::Duration;

use crate::config::Config;

/// One connection against `addrs` with short timers and no credentials.
///
/// Override individual fields on the returned struct where a test needs
/// specific behavior.
pub fn fast_config(addrs: &[String]) -> Config {
    let mut config = Config::default();
    config.target.addresses = addrs.to_vec();
    config.connection.count = 1;
    config.connection.ping_interval = Duration::from_millis(20);
    config.connection.read_timeout = Duration::from_millis(200);
    config.connection.idle_timeout = Duration::from_secs(60);
    config.connection.connect_timeout = Duration::from_millis(200);
    config.connection.open_rate = 100;
    config.backoff.min = Duration::from_millis(10);
    config.backoff.max = Duration::from_millis(50);
    config.metrics.report_interval = Duration::from_millis(50);
    config
}

/// [`fast_config`] with a password (and optional username) set.
pub fn with_credentials(mut config: Config, username: Option<&str>, password: &str) -> Config {
    config.connection.username = username.map(str::to_string);
    config.connection.password = Some(password.to_string());
    config
}
