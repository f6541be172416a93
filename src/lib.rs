//! connsoak - connection-capacity soak tester for RESP key-value clusters.
//!
//! Opens a configurable population of long-lived client connections against
//! one or more nodes, authenticates them, optionally selects a database, and
//! keeps every one of them alive with periodic `PING`s. Failed or idle
//! connections are discarded and reopened with jittered exponential backoff.
//!
//! # Modules
//!
//! - [`config`] - Configuration from TOML, environment and CLI overrides
//! - [`protocol`] - Minimal RESP command encoder and reply classifier
//! - [`transport`] - Plain TCP and TLS dialing
//! - [`pool`] - Workers, the connection state machine, limiter and metrics
//! - [`cli`] - The `connsoak` command-line interface
//! - [`error`] - Error types for the crate
//!
//! # Example
//!
//! ```no_run
//! use connsoak::config::Config;
//! use connsoak::pool::run_with_shutdown;
//! use tokio::sync::watch;
//!
//! # async fn demo() -> connsoak::error::Result<()> {
//! let mut config = Config::default();
//! config.target.addresses = vec!["10.0.0.1:6379".into()];
//! config.connection.count = 100;
//!
//! let (stop, shutdown) = watch::channel(false);
//! let pool = tokio::spawn(run_with_shutdown(config, shutdown));
//! // ... later
//! let _ = stop.send(true);
//! let snapshot = pool.await??;
//! println!("opened {} connections", snapshot.opened);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod pool;
pub mod protocol;
pub mod transport;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
