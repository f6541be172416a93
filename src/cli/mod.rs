//! Command-line interface definitions.

pub mod check;
pub mod output;
pub mod run;

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::config::{split_address_list, Config};
use crate::error::Result;

/// connsoak - hold a large population of RESP connections open and healthy.
#[derive(Parser, Debug)]
#[command(name = "connsoak")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open the connection population and keep it alive until interrupted
    Run(RunArgs),

    /// Run diagnostic checks
    #[command(subcommand)]
    Check(CheckCommand),
}

/// Subcommands for `connsoak check`
#[derive(Subcommand, Debug)]
pub enum CheckCommand {
    /// Validate configuration and print the resolved settings
    Config(ConfigPathArg),
    /// Dial every target once, handshake and PING
    Connection(ConfigPathArg),
}

/// Shared argument for commands that only need a config path.
#[derive(Parser, Debug)]
pub struct ConfigPathArg {
    /// Path to configuration file (defaults and environment only if omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Comma-separated node addresses (port 6379 if omitted)
    #[arg(long)]
    pub addrs: Option<String>,

    /// Number of concurrent connections
    #[arg(long)]
    pub connections: Option<usize>,

    /// ACL username for AUTH
    #[arg(long)]
    pub username: Option<String>,

    /// Password for AUTH
    #[arg(long)]
    pub password: Option<String>,

    /// Database index to SELECT after connecting
    #[arg(long)]
    pub db: Option<u32>,

    /// Connect over TLS
    #[arg(long)]
    pub tls: bool,

    /// Keepalive PING interval (e.g. "30s")
    #[arg(long, value_parser = humantime::parse_duration)]
    pub ping_interval: Option<Duration>,

    /// Reply deadline for every command (e.g. "2s")
    #[arg(long, value_parser = humantime::parse_duration)]
    pub read_timeout: Option<Duration>,

    /// Recycle connections with no successful PING for this long (e.g. "10m")
    #[arg(long, value_parser = humantime::parse_duration)]
    pub idle_timeout: Option<Duration>,

    /// Dial deadline including the TLS handshake (e.g. "5s")
    #[arg(long, value_parser = humantime::parse_duration)]
    pub connect_timeout: Option<Duration>,

    /// Maximum new connections per second during start-up
    #[arg(long)]
    pub open_rate: Option<usize>,

    /// Override log level (debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Use JSON log format instead of pretty
    #[arg(long)]
    pub json_logs: bool,
}

impl RunArgs {
    /// Apply command-line overrides on top of file and environment settings.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(ref addrs) = self.addrs {
            config.target.addresses = split_address_list(addrs);
        }
        if self.tls {
            config.target.tls = true;
        }
        let conn = &mut config.connection;
        if let Some(count) = self.connections {
            conn.count = count;
        }
        if let Some(ref username) = self.username {
            conn.username = Some(username.clone());
        }
        if let Some(ref password) = self.password {
            conn.password = Some(password.clone());
        }
        if let Some(db) = self.db {
            conn.db = db;
        }
        if let Some(d) = self.ping_interval {
            conn.ping_interval = d;
        }
        if let Some(d) = self.read_timeout {
            conn.read_timeout = d;
        }
        if let Some(d) = self.idle_timeout {
            conn.idle_timeout = d;
        }
        if let Some(d) = self.connect_timeout {
            conn.connect_timeout = d;
        }
        if let Some(rate) = self.open_rate {
            conn.open_rate = rate;
        }
        if let Some(ref level) = self.log_level {
            config.logging.level = level.clone();
        }
        if self.json_logs {
            config.logging.format = "json".to_string();
        }
    }
}

/// File (if given) then environment, not yet validated.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_env();
    Ok(config)
}
