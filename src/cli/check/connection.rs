use std::path::Path;
use std::sync::Arc;

use crate::cli::{load_config, output};
use crate::config::DialTarget;
use crate::error::{Error, Result};
use crate::pool::{probe, WorkerConfig};
use crate::transport::Dialer;

/// Dial every target once, run the handshake and a PING.
///
/// Fails with the first error if any target could not be probed.
pub async fn execute_connection(config_path: Option<&Path>) -> Result<()> {
    let mut config = load_config(config_path)?;
    config.validate()?;

    let targets: Arc<[DialTarget]> = config.targets().into();
    let dialer = Dialer::new(config.target.tls_verify)?;
    let probe_config = WorkerConfig::from_config(0, &config, Arc::clone(&targets));

    output::section("Probing targets");
    let mut first_failure = None;
    for target in targets.iter() {
        output::progress(&target.address);
        match probe(&dialer, target, &probe_config).await {
            Ok(elapsed) => output::progress_done(true, format!("({elapsed:.1?})")),
            Err(e) => {
                output::progress_done(false, &e);
                first_failure.get_or_insert(e);
            }
        }
    }

    match first_failure {
        Some(e) => Err(Error::Connection(e)),
        None => {
            output::ok("All targets reachable");
            Ok(())
        }
    }
}
