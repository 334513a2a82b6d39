//! BlueZ-backed transport (Linux only, via `bluer`).

use std::future::Future;
use std::time::Duration;

use bluer::gatt::remote::Characteristic;
use bluer::{Adapter, AdapterEvent, Address, Device, Session};
use futures::{pin_mut, Stream, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bluetooth::{Link, LinkError, LinkResult, Transport};
use crate::config::DeviceConfig;
use crate::types::DeviceHandle;

/// Transport over a local BlueZ adapter.
pub struct BluezTransport {
    // Keeps the D-Bus connection alive for the adapter handle.
    _session: Session,
    adapter: Adapter,
    characteristic: Uuid,
}

impl BluezTransport {
    /// Open a BlueZ session and power on the configured adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if the Bluetooth daemon is unreachable, the adapter
    /// does not exist, or it cannot be powered on.
    pub async fn new(config: &DeviceConfig) -> LinkResult<Self> {
        let session = Session::new()
            .await
            .map_err(|e| LinkError::SessionInitFailed {
                message: e.to_string(),
            })?;

        let adapter = match config.adapter.as_deref() {
            Some(name) => session.adapter(name),
            None => session.default_adapter().await,
        }
        .map_err(|_| LinkError::AdapterNotFound)?;

        let powered = adapter
            .is_powered()
            .await
            .map_err(|_| LinkError::AdapterNotFound)?;
        if !powered {
            info!(adapter = %adapter.name(), "Powering on Bluetooth adapter");
            adapter
                .set_powered(true)
                .await
                .map_err(|_| LinkError::AdapterPoweredOff)?;
        }

        debug!(adapter = %adapter.name(), "Bluetooth adapter ready");

        Ok(Self {
            _session: session,
            adapter,
            characteristic: config.characteristic_uuid,
        })
    }

    async fn find_characteristic(&self, device: &Device) -> LinkResult<Characteristic> {
        let address = device.address().to_string();
        let lookup_failed = |e: bluer::Error| LinkError::ConnectFailed {
            address: address.clone(),
            message: format!("GATT lookup failed: {e}"),
        };

        for service in device.services().await.map_err(lookup_failed)? {
            for characteristic in service.characteristics().await.map_err(lookup_failed)? {
                if characteristic.uuid().await.map_err(lookup_failed)? == self.characteristic {
                    return Ok(characteristic);
                }
            }
        }

        Err(LinkError::CharacteristicNotFound {
            address,
            uuid: self.characteristic,
        })
    }
}

impl Transport for BluezTransport {
    type Link = BluezLink;

    async fn sweep(
        &mut self,
        target_name: &str,
        timeout: Duration,
    ) -> LinkResult<Option<DeviceHandle>> {
        // Property changes come through as repeated `DeviceAdded` events, so a
        // name that only arrives with the scan response is still seen.
        let events = self
            .adapter
            .discover_devices_with_changes()
            .await
            .map_err(|e| LinkError::DiscoveryFailed {
                message: e.to_string(),
            })?;

        let adapter = &self.adapter;
        let search = first_named(events, target_name, move |address| async move {
            let device = adapter.device(address).ok()?;
            match device.name().await {
                Ok(name) => name,
                Err(e) => {
                    debug!(%address, error = %e, "Could not read device name");
                    None
                }
            }
        });

        // Dropping the event stream ends the discovery session.
        Ok(tokio::time::timeout(timeout, search).await.unwrap_or(None))
    }

    async fn connect(&mut self, handle: &DeviceHandle) -> LinkResult<BluezLink> {
        let address: Address = handle
            .address
            .parse()
            .map_err(|_| LinkError::InvalidAddress {
                address: handle.address.clone(),
            })?;
        let connect_failed = |e: bluer::Error| LinkError::ConnectFailed {
            address: handle.address.clone(),
            message: e.to_string(),
        };

        let device = self.adapter.device(address).map_err(connect_failed)?;
        if !device.is_connected().await.map_err(connect_failed)? {
            device.connect().await.map_err(connect_failed)?;
        }

        let characteristic = match self.find_characteristic(&device).await {
            Ok(characteristic) => characteristic,
            Err(e) => {
                if let Err(disconnect_err) = device.disconnect().await {
                    debug!(address = %handle.address, error = %disconnect_err, "Disconnect after failed lookup");
                }
                return Err(e);
            }
        };

        Ok(BluezLink {
            address: handle.address.clone(),
            device,
            characteristic,
        })
    }
}

/// Wait for the first device whose name, looked up on every event, equals `target_name`.
async fn first_named<E, N, F>(events: E, target_name: &str, mut name_of: N) -> Option<DeviceHandle>
where
    E: Stream<Item = AdapterEvent>,
    N: FnMut(Address) -> F,
    F: Future<Output = Option<String>>,
{
    pin_mut!(events);
    while let Some(event) = events.next().await {
        let AdapterEvent::DeviceAdded(address) = event else {
            continue;
        };
        if let Some(name) = name_of(address).await {
            if name == target_name {
                return Some(DeviceHandle::new(address.to_string(), name));
            }
        }
    }
    None
}

/// A connected peripheral plus its telemetry characteristic.
pub struct BluezLink {
    address: String,
    device: Device,
    characteristic: Characteristic,
}

impl Link for BluezLink {
    async fn write(&mut self, payload: &[u8]) -> LinkResult<()> {
        self.characteristic
            .write(payload)
            .await
            .map_err(|e| LinkError::WriteFailed {
                address: self.address.clone(),
                message: e.to_string(),
            })
    }

    async fn disconnect(self) {
        if let Err(e) = self.device.disconnect().await {
            warn!(address = %self.address, error = %e, "Failed to disconnect cleanly");
        }
    }
}
