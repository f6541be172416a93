//! The connection population.
//!
//! [`Coordinator`] launches one [`Worker`] per configured connection, the
//! limiter refill task and the metrics reporter, then waits for every worker to
//! drain after the shutdown signal.

pub mod backoff;
pub mod limiter;
pub mod metrics;
pub mod rotator;
pub mod worker;

pub use backoff::Backoff;
pub use limiter::BurstLimiter;
pub use metrics::{Metrics, MetricsSnapshot};
pub use rotator::TargetRotator;
pub use worker::{probe, Worker, WorkerConfig};

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::{Config, DialTarget};
use crate::error::Result;
use crate::transport::Dialer;

/// Resolves once shutdown has been requested.
///
/// A dropped sender counts as a request.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

pub struct Coordinator {
    config: Config,
    targets: Arc<[DialTarget]>,
    dialer: Arc<Dialer>,
    metrics: Arc<Metrics>,
}

impl Coordinator {
    /// Validate `config` and prepare the shared state. Nothing is spawned yet.
    pub fn new(mut config: Config) -> Result<Self> {
        config.validate()?;
        let targets: Arc<[DialTarget]> = config.targets().into();
        let dialer = Arc::new(Dialer::new(config.target.tls_verify)?);
        Ok(Self {
            config,
            targets,
            dialer,
            metrics: Arc::new(Metrics::new()),
        })
    }

    /// Counters shared with every worker; readable while the pool runs.
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Run until `shutdown` flips to `true` and every worker has exited.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<MetricsSnapshot> {
        let count = self.config.connection.count;
        info!(
            workers = count,
            targets = self.targets.len(),
            tls = self.config.target.tls,
            open_rate = self.config.connection.open_rate,
            "Starting connection pool"
        );

        let limiter = Arc::new(BurstLimiter::new(self.config.connection.open_rate));
        let refill = limiter.spawn_refill(shutdown.clone());
        let reporter = metrics::spawn_reporter(
            Arc::clone(&self.metrics),
            self.config.metrics.report_interval,
            shutdown.clone(),
        );

        let mut workers = JoinSet::new();
        for id in 0..count {
            let worker = Worker::new(
                WorkerConfig::from_config(id, &self.config, Arc::clone(&self.targets)),
                Arc::clone(&self.dialer),
                Arc::clone(&self.metrics),
                shutdown.clone(),
            );
            workers.spawn(worker.run(Some(Arc::clone(&limiter))));
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Worker task failed");
            }
        }

        refill.await?;
        reporter.await?;

        let snapshot = self.metrics.snapshot();
        info!(
            opened = snapshot.opened,
            restarts = snapshot.restarts,
            active = snapshot.active,
            "Connection pool drained"
        );
        Ok(snapshot)
    }
}

/// Build a [`Coordinator`] from `config` and run it under `shutdown`.
pub async fn run_with_shutdown(
    config: Config,
    shutdown: watch::Receiver<bool>,
) -> Result<MetricsSnapshot> {
    Coordinator::new(config)?.run(shutdown).await
}
