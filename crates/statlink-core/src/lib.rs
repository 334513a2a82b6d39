//! # statlink-core
//!
//! Core logic for statlink, a host agent that streams system telemetry to a
//! Bluetooth Low Energy peripheral.
//!
//! ## Architecture
//!
//! - [`config`] - Layered configuration and validation
//! - [`metrics`] - Local CPU, memory, disk and battery readings
//! - [`temperature`] - CPU temperature scraped from a remote sensor tree
//! - [`sampler`] - Combines both sources into a [`TelemetrySample`]
//! - [`bluetooth`] - The transport seam between the lifecycle and the radio
//! - [`discovery`] - Bounded scanning for the peripheral
//! - [`session`] - The write loop over one connection
//! - [`supervisor`] - Reconnect forever, rescan on loss
//! - [`error`] - Unified error type
//!
//! The BlueZ transport is only compiled with the `bluetooth` feature.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod bluetooth;
#[cfg(feature = "bluetooth")]
pub mod bluez;
pub mod config;
pub mod discovery;
pub mod error;
pub mod metrics;
pub mod sampler;
pub mod session;
pub mod supervisor;
pub mod temperature;
pub mod types;

#[cfg(test)]
mod testing;

pub use bluetooth::{Link, LinkError, LinkResult, Transport};
#[cfg(feature = "bluetooth")]
pub use bluez::{BluezLink, BluezTransport};
pub use config::{
    Config, ConfigError, ConfigResult, DeviceConfig, DiscoveryConfig, LogFormat, LoggingConfig,
    RemoteConfig, SessionConfig,
};
pub use discovery::DeviceScanner;
pub use error::{Result, StatlinkError};
pub use metrics::{MetricSource, SystemMetrics, Usage};
pub use sampler::Sampler;
pub use session::LinkSession;
pub use supervisor::{ConnectionSupervisor, SupervisorState};
pub use temperature::{FetchError, RemoteTemperatureFetcher, TemperatureSource};
pub use types::{DeviceHandle, TelemetrySample};
