//! Shared CLI output helpers for consistent operator-facing text.

use std::fmt::Display;
use std::io::{self, Write};

use crate::pool::MetricsSnapshot;

const RULE_WIDTH: usize = 56;

/// Print a section header and separator.
pub fn section(title: &str) {
    println!();
    println!("{title}");
    println!("{}", "─".repeat(RULE_WIDTH));
}

/// Print a simple key/value line.
pub fn key_value(label: &str, value: impl Display) {
    println!("{label:<16} {value}");
}

/// Print a successful status line.
pub fn ok(message: &str) {
    println!("✓ {message}");
}

/// Print a warning status line.
pub fn warn(message: &str) {
    println!("⚠ {message}");
}

/// Print an error status line.
pub fn error(message: &str) {
    eprintln!("✗ {message}");
}

/// Start a progress line in the format `Label... `.
pub fn progress(label: &str) {
    print!("{label}... ");
    let _ = io::stdout().flush();
}

/// Finish a progress line with a trailing detail.
pub fn progress_done(success: bool, detail: impl Display) {
    println!("{} {detail}", if success { "ok" } else { "failed" });
}

/// Print final counters as a section.
pub fn metrics_summary(snapshot: &MetricsSnapshot) {
    section("Final metrics");
    key_value("opened", snapshot.opened);
    key_value("authed", snapshot.authed);
    key_value("pongs", snapshot.pongs);
    key_value("errors", snapshot.errors);
    key_value("restarts", snapshot.restarts);
    key_value("active", snapshot.active);
}
