//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Stream host telemetry to a BLE peripheral.
#[derive(Debug, Parser)]
#[command(name = "statlink-agent", version, about)]
pub struct Args {
    /// Path to a TOML configuration file.
    ///
    /// Falls back to the platform config directory when omitted.
    #[arg(env = "STATLINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the configured log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}
