use std::path::Path;

use crate::cli::{load_config, output};
use crate::config::Config;
use crate::error::Result;

/// Validate configuration without opening any connection.
pub fn execute_config(config_path: Option<&Path>) -> Result<()> {
    match config_path {
        Some(path) => output::key_value("Config file", path.display()),
        None => output::key_value("Config file", "(none, defaults and environment)"),
    }

    let mut config = load_config(config_path)?;
    config.validate()?;

    output::ok("Configuration is valid");
    print_summary(&config);
    Ok(())
}

fn print_summary(config: &Config) {
    output::section("Targets");
    for addr in &config.target.addresses {
        output::key_value("address", addr);
    }
    output::key_value("tls", config.target.tls);
    if config.target.tls {
        output::key_value("tls verify", config.target.tls_verify);
    }

    let conn = &config.connection;
    output::section("Connections");
    output::key_value("count", conn.count);
    output::key_value("db", conn.db);
    output::key_value("open rate", format!("{}/s", conn.open_rate));
    output::key_value("ping", humantime::format_duration(conn.ping_interval));
    output::key_value("read timeout", humantime::format_duration(conn.read_timeout));
    output::key_value("idle timeout", humantime::format_duration(conn.idle_timeout));
    output::key_value("connect timeout", humantime::format_duration(conn.connect_timeout));
    output::key_value(
        "backoff",
        format!(
            "{} .. {}",
            humantime::format_duration(config.backoff.min),
            humantime::format_duration(config.backoff.max)
        ),
    );

    output::section("Credentials");
    match config.credentials() {
        Some(creds) => {
            output::key_value("username", creds.username.as_deref().unwrap_or("(none)"));
            output::key_value("password", if creds.password.is_empty() { "(empty)" } else { "********" });
        }
        None => output::warn("No credentials configured, AUTH will be skipped"),
    }
}
