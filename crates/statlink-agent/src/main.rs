//! # statlink-agent
//!
//! Samples CPU, memory, disk, battery and a remote CPU temperature reading,
//! and streams them as JSON to an ESP32 display over Bluetooth Low Energy.
//!
//! ## Running
//!
//! ```bash
//! # Development
//! RUST_LOG=debug cargo run --package statlink-agent --features bluetooth -- agent.toml
//!
//! # Production
//! STATLINK_CONFIG=/etc/statlink/config.toml ./statlink-agent
//! ```
//!
//! The process only exits on its own when the display cannot be found on the
//! first round of discovery.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use anyhow::Context;
use clap::Parser;
use statlink_core::{
    BluezTransport, Config, ConnectionSupervisor, DeviceScanner, RemoteTemperatureFetcher,
    Sampler, StatlinkError, SystemMetrics,
};
use statlink_agent::{cli::Args, logging};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())
        .map_err(StatlinkError::from)
        .context("failed to load configuration")?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    logging::init(&config.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        device = %config.device.name,
        characteristic = %config.device.characteristic_uuid,
        remote = %config.remote.url,
        "Starting statlink-agent"
    );

    let transport = BluezTransport::new(&config.device)
        .await
        .map_err(StatlinkError::from)
        .context("Bluetooth initialization failed")?;

    let fetcher = RemoteTemperatureFetcher::new(&config.remote)?;
    let metrics = SystemMetrics::new(config.session.cpu_window());
    let sampler = Sampler::new(metrics, fetcher, config.session.disk_path.clone());
    let scanner = DeviceScanner::new(&config.device, &config.discovery);

    let mut supervisor =
        ConnectionSupervisor::new(transport, scanner, sampler, config.session.backoff());

    tokio::select! {
        result = supervisor.run() => {
            match result {
                Ok(never) => match never {},
                Err(e) => Err(e).context("giving up on the display"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            Ok(())
        }
    }
}
