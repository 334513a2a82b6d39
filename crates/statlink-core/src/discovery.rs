//! Bounded discovery of the target peripheral.

use std::time::Duration;

use tracing::{info, warn};

use crate::bluetooth::Transport;
use crate::config::{DeviceConfig, DiscoveryConfig};
use crate::types::DeviceHandle;

/// Searches for a peripheral by advertised name with a fixed retry budget.
#[derive(Debug, Clone)]
pub struct DeviceScanner {
    target_name: String,
    max_attempts: u32,
    sweep_timeout: Duration,
    retry_delay: Duration,
}

impl DeviceScanner {
    /// Create a scanner for the configured device name and sweep settings.
    #[must_use]
    pub fn new(device: &DeviceConfig, discovery: &DiscoveryConfig) -> Self {
        Self {
            target_name: device.name.clone(),
            max_attempts: discovery.max_attempts,
            sweep_timeout: discovery.sweep_timeout(),
            retry_delay: discovery.retry_delay(),
        }
    }

    /// Advertised name being searched for.
    #[must_use]
    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Number of sweeps performed before giving up.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run up to `max_attempts` sweeps, pausing between unsuccessful ones.
    ///
    /// A sweep that errors counts as an unsuccessful attempt. Returns `None`
    /// once every attempt is used up; the caller decides what that means.
    pub async fn discover<T: Transport>(&self, transport: &mut T) -> Option<DeviceHandle> {
        for attempt in 1..=self.max_attempts {
            info!(
                device = %self.target_name,
                attempt,
                max_attempts = self.max_attempts,
                "Scanning for device"
            );

            match transport.sweep(&self.target_name, self.sweep_timeout).await {
                Ok(Some(device)) => {
                    info!(device = %device.name, address = %device.address, "Found device");
                    return Some(device);
                }
                Ok(None) => {}
                Err(e) => warn!(attempt, error = %e, "Bluetooth scan error"),
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        warn!(
            device = %self.target_name,
            attempts = self.max_attempts,
            "Device not found after retries"
        );
        None
    }
}
