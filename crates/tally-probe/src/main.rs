//! tally-probe
//!
//! Publishes the metrics described in a YAML file and logs a JSON snapshot,
//! read back through a `View`, on every interval.
//! Usage: `tally-probe [config.yaml]` (default `tally.yaml`).

use std::process::ExitCode;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

use tally_probe::{config, probe::Probe};

#[tokio::main]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "tally.yaml".into());
    match run(&path).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, code = e.code().as_str(), "tally-probe failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(path: &str) -> tally_core::Result<()> {
    let cfg = config::load_from_file(path)?;
    let mut probe = Probe::from_config(&cfg)?;

    let mut interval = tokio::time::interval(Duration::from_millis(cfg.probe.publish_interval_ms));
    tracing::info!(%path, interval_ms = cfg.probe.publish_interval_ms, "tally-probe starting");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                probe.tick()?;
                let snapshot = probe.snapshot()?;
                tracing::info!(tick = probe.ticks(), %snapshot, "published");
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown requested");
                return Ok(());
            }
        }
    }
}
