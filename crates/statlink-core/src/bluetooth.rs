//! Bluetooth Low Energy transport abstraction.
//!
//! This module defines the seam between the connection lifecycle and the radio:
//! - [`Transport`] runs one discovery sweep and opens links
//! - [`Link`] writes payloads to the peripheral's telemetry characteristic
//! - [`LinkError`] covers every way the radio side can fail
//!
//! The BlueZ implementation lives in `bluez` behind the `bluetooth` feature;
//! tests drive the lifecycle with in-memory fakes.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::types::DeviceHandle;

/// Errors raised by the Bluetooth transport.
#[derive(Debug, Error)]
pub enum LinkError {
    /// No Bluetooth adapter is available.
    #[error("No Bluetooth adapter found")]
    AdapterNotFound,

    /// The adapter exists but could not be powered on.
    #[error("Bluetooth adapter is powered off and could not be powered on")]
    AdapterPoweredOff,

    /// Could not open a session with the Bluetooth daemon.
    #[error("Failed to initialise Bluetooth session: {message}")]
    SessionInitFailed {
        /// Underlying error text.
        message: String,
    },

    /// A discovery sweep failed (adapter busy, daemon error...).
    #[error("Device discovery failed: {message}")]
    DiscoveryFailed {
        /// Underlying error text.
        message: String,
    },

    /// The address handed to the transport cannot be parsed.
    #[error("Invalid Bluetooth address: {address}")]
    InvalidAddress {
        /// The offending address.
        address: String,
    },

    /// Connecting to the peripheral failed.
    #[error("Failed to connect to {address}: {message}")]
    ConnectFailed {
        /// Peripheral address.
        address: String,
        /// Underlying error text.
        message: String,
    },

    /// The peripheral does not expose the telemetry characteristic.
    #[error("Characteristic {uuid} not found on {address}")]
    CharacteristicNotFound {
        /// Peripheral address.
        address: String,
        /// Characteristic that was looked for.
        uuid: uuid::Uuid,
    },

    /// Writing to the characteristic failed, usually because the link dropped.
    #[error("Write to {address} failed: {message}")]
    WriteFailed {
        /// Peripheral address.
        address: String,
        /// Underlying error text.
        message: String,
    },

    /// A local failure unrelated to the radio (sampling task, encoding).
    #[error("Internal error: {message}")]
    Internal {
        /// Description of what went wrong.
        message: String,
    },
}

/// Result type for transport operations.
pub type LinkResult<T> = std::result::Result<T, LinkError>;

/// Something that can find peripherals and open links to them.
///
/// At most one [`Link`] obtained from a transport is alive at any time; the
/// session owns it and drops it before the supervisor scans again.
pub trait Transport: Send {
    /// Link type produced by [`Transport::connect`].
    type Link: Link;

    /// Run a single discovery sweep lasting at most `timeout`.
    ///
    /// Resolves to the first peripheral whose advertised name equals
    /// `target_name`, or `None` if the sweep ends without a match.
    fn sweep(
        &mut self,
        target_name: &str,
        timeout: Duration,
    ) -> impl Future<Output = LinkResult<Option<DeviceHandle>>> + Send;

    /// Connect to a previously discovered peripheral.
    fn connect(
        &mut self,
        device: &DeviceHandle,
    ) -> impl Future<Output = LinkResult<Self::Link>> + Send;
}

/// An established connection to a peripheral.
pub trait Link: Send {
    /// Write one payload to the telemetry characteristic.
    fn write(&mut self, payload: &[u8]) -> impl Future<Output = LinkResult<()>> + Send;

    /// Tear the connection down. Failures are logged, not returned.
    fn disconnect(self) -> impl Future<Output = ()> + Send;
}
