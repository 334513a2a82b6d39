//! Shared types passed between the scanner, the session and the supervisor.
//!
//! [`TelemetrySample`] is the per-tick snapshot and owns the wire encoding sent to
//! the peripheral. [`DeviceHandle`] identifies one discovered peripheral.

use std::fmt;

use serde::{Serialize, Serializer};

const BYTES_PER_MIB: u64 = 1024 * 1024;
const BYTES_PER_GIB: u64 = 1024 * 1024 * 1024;

/// One snapshot of host metrics, created fresh on every sampling tick.
///
/// Every field is always populated. A metric that could not be read is carried
/// as its sentinel (`0` / `0.0`) rather than omitted, so the peripheral always
/// receives a complete record.
///
/// Field order is the wire order of the encoded payload.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TelemetrySample {
    /// Global CPU usage in percent, `[0, 100]`.
    #[serde(rename = "cpu")]
    pub cpu_percent: f64,

    /// Used memory in MiB.
    #[serde(rename = "ram_used")]
    pub ram_used_mb: u64,

    /// Total memory in MiB.
    #[serde(rename = "ram_total")]
    pub ram_total_mb: u64,

    /// Used space of the monitored filesystem in GiB.
    #[serde(rename = "disk_used")]
    pub disk_used_gb: u64,

    /// Total space of the monitored filesystem in GiB.
    #[serde(rename = "disk_total")]
    pub disk_total_gb: u64,

    /// Battery charge in percent, `0` when the host has no battery.
    #[serde(rename = "battery", serialize_with = "serialize_percent")]
    pub battery_percent: f64,

    /// CPU core temperature in °C, `0.0` when unavailable.
    #[serde(rename = "temperature")]
    pub temperature_c: f64,
}

impl TelemetrySample {
    /// Encode the sample as the compact JSON payload written to the peripheral.
    ///
    /// # Errors
    ///
    /// Returns an error only if serialization itself fails.
    pub fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Convert a byte count to whole MiB (truncating).
#[must_use]
pub const fn bytes_to_mib(bytes: u64) -> u64 {
    bytes / BYTES_PER_MIB
}

/// Convert a byte count to whole GiB (truncating).
#[must_use]
pub const fn bytes_to_gib(bytes: u64) -> u64 {
    bytes / BYTES_PER_GIB
}

/// Whole percentages go out as integers (`87`), fractional ones as numbers (`87.5`).
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn serialize_percent<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if value.is_finite() && value.fract() == 0.0 && *value >= 0.0 && *value <= 100.0 {
        serializer.serialize_u64(*value as u64)
    } else {
        serializer.serialize_f64(*value)
    }
}

/// A peripheral found during discovery.
///
/// Holds the transport address used to connect and the advertised name that
/// matched. A handle is only valid for one connection attempt cycle; after a
/// link loss the supervisor scans again for a fresh one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    /// Transport-level address (a Bluetooth MAC for BlueZ).
    pub address: String,

    /// Advertised name the device was matched on.
    pub name: String,
}

impl DeviceHandle {
    /// Create a new handle.
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}
