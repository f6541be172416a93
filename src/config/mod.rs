//! Configuration loading and validation.
//!
//! Configuration is read from an optional TOML file, then overridden by
//! environment variables (the `REDIS_*` family plus a few tuning knobs,
//! e.g. `REDIS_ADDRESSES`), then by command-line flags. The password is never
//! read from the file; it comes from `REDIS_PASSWORD` or `--password`.

mod logging;
mod target;

pub use logging::LoggingConfig;
pub use target::{parse_addresses, split_address_list, DialTarget, DEFAULT_PORT};

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub backoff: BackoffConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which nodes to connect to and how.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Node addresses; `:6379` is appended when no port is given.
    #[serde(default = "default_addresses")]
    pub addresses: Vec<String>,
    /// Wrap every connection in TLS.
    #[serde(default)]
    pub tls: bool,
    /// Verify server certificates against the webpki roots.
    #[serde(default)]
    pub tls_verify: bool,
}

fn default_addresses() -> Vec<String> {
    vec!["localhost:6379".into()]
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            addresses: default_addresses(),
            tls: false,
            tls_verify: false,
        }
    }
}

/// Per-connection behaviour shared by every worker.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Number of concurrent connections (one worker each).
    #[serde(default = "default_count")]
    pub count: usize,
    /// Database index selected after the handshake; 0 skips SELECT.
    #[serde(default)]
    pub db: u32,
    /// ACL username. Empty means password-only AUTH.
    #[serde(default)]
    pub username: Option<String>,
    /// Loaded from `REDIS_PASSWORD` or `--password` only.
    #[serde(skip)]
    pub password: Option<String>,
    #[serde(default = "default_ping_interval", with = "humantime_serde")]
    pub ping_interval: Duration,
    #[serde(default = "default_read_timeout", with = "humantime_serde")]
    pub read_timeout: Duration,
    /// A connection with no successful PING for this long is recycled.
    #[serde(default = "default_idle_timeout", with = "humantime_serde")]
    pub idle_timeout: Duration,
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Maximum new connections admitted per second during start-up.
    #[serde(default = "default_open_rate")]
    pub open_rate: usize,
}

const fn default_count() -> usize {
    1000
}

const fn default_ping_interval() -> Duration {
    Duration::from_secs(30)
}

const fn default_read_timeout() -> Duration {
    Duration::from_secs(2)
}

const fn default_idle_timeout() -> Duration {
    Duration::from_secs(10 * 60)
}

const fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

const fn default_open_rate() -> usize {
    200
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            count: default_count(),
            db: 0,
            username: None,
            password: None,
            ping_interval: default_ping_interval(),
            read_timeout: default_read_timeout(),
            idle_timeout: default_idle_timeout(),
            connect_timeout: default_connect_timeout(),
            open_rate: default_open_rate(),
        }
    }
}

/// Reconnect delay bounds.
#[derive(Debug, Clone, Deserialize)]
pub struct BackoffConfig {
    #[serde(default = "default_backoff_min", with = "humantime_serde")]
    pub min: Duration,
    #[serde(default = "default_backoff_max", with = "humantime_serde")]
    pub max: Duration,
}

const fn default_backoff_min() -> Duration {
    Duration::from_millis(200)
}

const fn default_backoff_max() -> Duration {
    Duration::from_secs(5)
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min: default_backoff_min(),
            max: default_backoff_max(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// How often the aggregate counters are logged.
    #[serde(default = "default_report_interval", with = "humantime_serde")]
    pub report_interval: Duration,
}

const fn default_report_interval() -> Duration {
    Duration::from_secs(5)
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval: default_report_interval(),
        }
    }
}

/// AUTH parameters, present when a username or password is configured.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl Config {
    /// Load from a TOML file, apply environment overrides, and validate.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file as-is, without environment overrides or validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Ok(toml::from_str(&content).map_err(ConfigError::Parse)?)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
    }

    /// Apply overrides from `lookup`. Values that fail to parse are ignored
    /// and the current setting is kept.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(list) = lookup("REDIS_ADDRESSES") {
            self.target.addresses = split_address_list(&list);
        }
        if let Some(v) = lookup("REDIS_TLS").and_then(|v| parse_bool(&v)) {
            self.target.tls = v;
        }
        if let Some(v) = lookup("CONNECTIONS").and_then(|v| v.parse().ok()) {
            self.connection.count = v;
        }
        if let Some(v) = lookup("REDIS_USERNAME") {
            self.connection.username = Some(v);
        }
        if let Some(v) = lookup("REDIS_PASSWORD") {
            self.connection.password = Some(v);
        }
        if let Some(v) = lookup("REDIS_DB").and_then(|v| v.parse().ok()) {
            self.connection.db = v;
        }
        if let Some(v) = lookup("OPEN_RATE").and_then(|v| v.parse().ok()) {
            self.connection.open_rate = v;
        }

        let duration = |key: &str| lookup(key).and_then(|v| humantime::parse_duration(&v).ok());
        if let Some(d) = duration("PING_INTERVAL") {
            self.connection.ping_interval = d;
        }
        if let Some(d) = duration("READ_TIMEOUT") {
            self.connection.read_timeout = d;
        }
        if let Some(d) = duration("IDLE_TIMEOUT") {
            self.connection.idle_timeout = d;
        }
        if let Some(d) = duration("CONNECT_TIMEOUT") {
            self.connection.connect_timeout = d;
        }
    }

    /// Check invariants and repair the backoff ceiling.
    ///
    /// A `backoff.max` below `backoff.min` is raised to ten times the minimum.
    pub fn validate(&mut self) -> Result<()> {
        let invalid = |field: &'static str, reason: &str| -> crate::error::Error {
            ConfigError::InvalidValue {
                field,
                reason: reason.to_string(),
            }
            .into()
        };

        self.target.addresses = parse_addresses(&self.target.addresses);
        if self.target.addresses.is_empty() {
            return Err(ConfigError::MissingField {
                field: "target.addresses",
            }
            .into());
        }
        if self.connection.count == 0 {
            return Err(invalid("connection.count", "must be > 0"));
        }
        if self.connection.open_rate == 0 {
            return Err(invalid("connection.open_rate", "must be > 0"));
        }

        let durations = [
            ("connection.ping_interval", self.connection.ping_interval),
            ("connection.read_timeout", self.connection.read_timeout),
            ("connection.idle_timeout", self.connection.idle_timeout),
            ("connection.connect_timeout", self.connection.connect_timeout),
            ("metrics.report_interval", self.metrics.report_interval),
            ("backoff.min", self.backoff.min),
        ];
        for (field, value) in durations {
            if value.is_zero() {
                return Err(invalid(field, "must be > 0"));
            }
        }

        if self.backoff.max < self.backoff.min {
            self.backoff.max = self.backoff.min.saturating_mul(10);
        }
        Ok(())
    }

    /// The shared, ordered target list.
    pub fn targets(&self) -> Vec<DialTarget> {
        self.target
            .addresses
            .iter()
            .map(|addr| DialTarget::new(addr.clone(), self.target.tls))
            .collect()
    }

    pub fn credentials(&self) -> Option<Credentials> {
        let username = self
            .connection
            .username
            .clone()
            .filter(|u| !u.is_empty());
        let password = self.connection.password.clone().unwrap_or_default();
        if username.is_none() && password.is_empty() {
            return None;
        }
        Some(Credentials { username, password })
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Some(true),
        "0" | "false" | "no" | "n" => Some(false),
        _ => None,
    }
}
