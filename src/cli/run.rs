//! Handler for the `run` command.

use tokio::sync::watch;
use tracing::{info, warn};

use crate::cli::{load_config, output, RunArgs};
use crate::error::{Error, Result};
use crate::pool::Coordinator;

/// Execute the run command.
pub async fn execute(args: &RunArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    args.apply_overrides(&mut config);
    config.validate()?;

    config.init_logging();
    let json = config.logging.is_json();
    info!(
        targets = ?config.target.addresses,
        connections = config.connection.count,
        tls = config.target.tls,
        db = config.connection.db,
        ping_interval = %humantime::format_duration(config.connection.ping_interval),
        "connsoak starting"
    );

    let coordinator = Coordinator::new(config)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pool = tokio::spawn(coordinator.run(shutdown_rx));

    match shutdown_signal().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!(error = %e, "Signal handler failed, shutting down"),
    }
    let _ = shutdown_tx.send(true);

    let snapshot = pool.await??;
    if json {
        let line = serde_json::to_string(&snapshot).map_err(|e| Error::Io(e.into()))?;
        println!("{line}");
    } else {
        output::metrics_summary(&snapshot);
    }

    info!("connsoak stopped");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
