//! Unified error types for the statlink core library.
//!
//! This module provides a unified error type [`StatlinkError`] for failures that
//! leave a component's boundary. Each module also has its own specific error type
//! (`ConfigError`, `LinkError`, `FetchError`) for internal use.
//!
//! Most failures never reach this type: a failed temperature fetch becomes a
//! sentinel reading and a failed session becomes a backoff. What is left are
//! startup problems and the one fatal runtime condition, discovery exhaustion.
//!
//! # Example
//!
//! ```rust
//! use statlink_core::error::{StatlinkError, Result};
//!
//! fn require_attempts(attempts: u32) -> Result<()> {
//!     if attempts == 0 {
//!         return Err(StatlinkError::ConfigValidationError(
//!             "discovery.max_attempts: must be at least 1".into(),
//!         ));
//!     }
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// The unified error type for statlink operations.
#[derive(Debug, Error)]
pub enum StatlinkError {
    // =========================================================================
    // BLUETOOTH ERRORS
    // =========================================================================
    /// No Bluetooth adapter was found on this system.
    #[error(
        "No Bluetooth adapter found. Ensure Bluetooth hardware is present and bluetoothd is running."
    )]
    BluetoothAdapterNotFound,

    /// The Bluetooth adapter exists but is powered off.
    #[error("Bluetooth adapter is powered off. Run 'bluetoothctl power on' to enable.")]
    BluetoothAdapterPoweredOff,

    /// Any other Bluetooth failure.
    #[error("Bluetooth error: {0}")]
    BluetoothFailed(String),

    /// Discovery ran out of attempts before the first connection.
    #[error(
        "Device '{name}' not found after {attempts} scan attempts. Ensure it is powered on and within range."
    )]
    DeviceUnreachable {
        /// Advertised name that was searched for.
        name: String,
        /// Number of sweeps performed.
        attempts: u32,
    },

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// The configuration file was not found at the expected path.
    #[error("Configuration file not found at: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// The configuration exists but could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // =========================================================================
    // REMOTE SENSOR ERRORS
    // =========================================================================
    /// The HTTP client for the remote sensor could not be built.
    #[error("Failed to set up remote sensor client: {0}")]
    RemoteClientError(String),
}

/// A specialized [`Result`] type for statlink operations.
pub type Result<T> = std::result::Result<T, StatlinkError>;

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<crate::config::ConfigError> for StatlinkError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::NotFound(path) => Self::ConfigNotFound(path),
            ConfigError::Load(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::ValidationError { field, message } => {
                Self::ConfigValidationError(format!("{field}: {message}"))
            }
            ConfigError::MultipleValidationErrors(errors) => {
                let messages: Vec<String> = errors.into_iter().map(|e| e.to_string()).collect();
                Self::ConfigValidationError(messages.join("; "))
            }
        }
    }
}

impl From<crate::bluetooth::LinkError> for StatlinkError {
    fn from(err: crate::bluetooth::LinkError) -> Self {
        use crate::bluetooth::LinkError;
        match err {
            LinkError::AdapterNotFound => Self::BluetoothAdapterNotFound,
            LinkError::AdapterPoweredOff => Self::BluetoothAdapterPoweredOff,
            other => Self::BluetoothFailed(other.to_string()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
