//! One live connection to the peripheral.

use std::convert::Infallible;

use tracing::{debug, info, warn};

use crate::bluetooth::{Link, LinkError, Transport};
use crate::metrics::MetricSource;
use crate::sampler::Sampler;
use crate::temperature::TemperatureSource;
use crate::types::DeviceHandle;

/// Streams samples over a single link until it fails.
///
/// The session owns the link for its whole lifetime and never retries: the
/// first connect or write error ends it and is handed back to the caller.
pub struct LinkSession<'a, T, M, S> {
    transport: &'a mut T,
    sampler: &'a Sampler<M, S>,
}

impl<'a, T, M, S> LinkSession<'a, T, M, S>
where
    T: Transport,
    M: MetricSource + 'static,
    S: TemperatureSource,
{
    /// Borrow the transport and sampler for one session.
    pub fn new(transport: &'a mut T, sampler: &'a Sampler<M, S>) -> Self {
        Self { transport, sampler }
    }

    /// Connect to `device` and send a sample every tick.
    ///
    /// Only returns on failure. The link is disconnected before a write or
    /// encoding error is returned.
    pub async fn run(self, device: &DeviceHandle) -> Result<Infallible, LinkError> {
        let mut link = self.transport.connect(device).await?;
        info!(device = %device.name, address = %device.address, "Connected");

        loop {
            let sample = self.sampler.sample().await;

            let payload = match sample.to_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    link.disconnect().await;
                    return Err(LinkError::Internal {
                        message: format!("failed to encode sample: {e}"),
                    });
                }
            };

            if let Err(e) = link.write(&payload).await {
                warn!(address = %device.address, error = %e, "Write failed, dropping link");
                link.disconnect().await;
                return Err(e);
            }

            info!(payload = %String::from_utf8_lossy(&payload), "Sent");
            debug!(bytes = payload.len(), "Wrote sample");
        }
    }
}
