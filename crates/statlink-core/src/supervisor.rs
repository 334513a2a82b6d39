//! Top-level connection lifecycle.
//!
//! The supervisor drives a three-state machine:
//!
//! ```text
//!            found                 session ended
//! Searching ───────▶ Connected ────────────────▶ Backoff
//!     ▲  │                                          │
//!     │  └── exhausted, never connected: fatal      │
//!     │  └── exhausted after a connection ─────────▶│
//!     └─────────────────── delay ───────────────────┘
//! ```
//!
//! Discovery exhaustion before the first connection is the only way out of
//! [`ConnectionSupervisor::run`].

use std::convert::Infallible;
use std::fmt;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::bluetooth::Transport;
use crate::discovery::DeviceScanner;
use crate::error::{Result, StatlinkError};
use crate::metrics::MetricSource;
use crate::sampler::Sampler;
use crate::session::LinkSession;
use crate::temperature::TemperatureSource;
use crate::types::DeviceHandle;

/// Where the supervisor is in the connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorState {
    /// Scanning for the peripheral.
    Searching,
    /// A device was found; a session is about to run against it.
    Connected(DeviceHandle),
    /// Waiting before the next scan.
    Backoff,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Searching => write!(f, "searching"),
            Self::Connected(device) => write!(f, "connected to {device}"),
            Self::Backoff => write!(f, "backoff"),
        }
    }
}

/// Reconnects to the peripheral forever.
pub struct ConnectionSupervisor<T, M, S> {
    transport: T,
    scanner: DeviceScanner,
    sampler: Sampler<M, S>,
    backoff: Duration,
    connected_once: bool,
}

impl<T, M, S> ConnectionSupervisor<T, M, S>
where
    T: Transport,
    M: MetricSource + 'static,
    S: TemperatureSource,
{
    /// Create a supervisor that waits `backoff` between lost connections.
    pub fn new(
        transport: T,
        scanner: DeviceScanner,
        sampler: Sampler<M, S>,
        backoff: Duration,
    ) -> Self {
        Self {
            transport,
            scanner,
            sampler,
            backoff,
            connected_once: false,
        }
    }

    /// Whether a session has ever been started.
    #[must_use]
    pub const fn has_connected(&self) -> bool {
        self.connected_once
    }

    /// Run the lifecycle until discovery fails before any connection.
    ///
    /// # Errors
    ///
    /// Returns [`StatlinkError::DeviceUnreachable`] when the first round of
    /// discovery finds nothing.
    pub async fn run(&mut self) -> Result<Infallible> {
        let mut state = SupervisorState::Searching;
        loop {
            state = self.step(state).await?;
        }
    }

    /// Perform one transition.
    ///
    /// # Errors
    ///
    /// Returns [`StatlinkError::DeviceUnreachable`] from `Searching` when
    /// discovery is exhausted and no connection was ever made.
    pub async fn step(&mut self, state: SupervisorState) -> Result<SupervisorState> {
        info!(%state, "Supervisor step");

        match state {
            SupervisorState::Searching => match self.scanner.discover(&mut self.transport).await {
                Some(device) => Ok(SupervisorState::Connected(device)),
                None if self.connected_once => {
                    warn!(
                        device = %self.scanner.target_name(),
                        "Device not found, will rescan after backoff"
                    );
                    Ok(SupervisorState::Backoff)
                }
                None => {
                    error!(
                        device = %self.scanner.target_name(),
                        attempts = self.scanner.max_attempts(),
                        "Could not find device, giving up"
                    );
                    Err(StatlinkError::DeviceUnreachable {
                        name: self.scanner.target_name().to_string(),
                        attempts: self.scanner.max_attempts(),
                    })
                }
            },
            SupervisorState::Connected(device) => {
                self.connected_once = true;
                let session = LinkSession::new(&mut self.transport, &self.sampler);
                match session.run(&device).await {
                    Ok(never) => match never {},
                    Err(e) => warn!(device = %device, error = %e, "Connection lost"),
                }
                Ok(SupervisorState::Backoff)
            }
            SupervisorState::Backoff => {
                info!(delay_ms = self.backoff.as_millis(), "Reconnecting after backoff");
                tokio::time::sleep(self.backoff).await;
                Ok(SupervisorState::Searching)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeviceConfig, DiscoveryConfig};
    use crate::testing::{FakeMetrics, FakeTransport, FixedTemperature};

    type TestSupervisor = ConnectionSupervisor<FakeTransport, FakeMetrics, FixedTemperature>;

    fn esp32() -> DeviceHandle {
        DeviceHandle::new("AA:BB:CC:DD:EE:FF", "ESP32_TaskManager")
    }

    fn supervisor(transport: FakeTransport) -> TestSupervisor {
        let scanner = DeviceScanner::new(
            &DeviceConfig::default(),
            &DiscoveryConfig {
                max_attempts: 2,
                sweep_timeout_ms: 10,
                retry_delay_ms: 0,
            },
        );
        let sampler = Sampler::new(FakeMetrics::scenario(), FixedTemperature(55.3), "/");
        ConnectionSupervisor::new(transport, scanner, sampler, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_searching_to_connected() {
        let mut sup = supervisor(FakeTransport::finding(esp32()));

        let next = sup.step(SupervisorState::Searching).await.unwrap();
        assert_eq!(next, SupervisorState::Connected(esp32()));
        assert!(!sup.has_connected());
    }

    #[tokio::test]
    async fn test_connected_to_backoff_on_session_end() {
        let mut sup = supervisor(FakeTransport::finding(esp32()));
        let log = sup.transport.log.clone();

        let next = sup.step(SupervisorState::Connected(esp32())).await.unwrap();
        assert_eq!(next, SupervisorState::Backoff);
        assert!(sup.has_connected());
        assert_eq!(log.lock().unwrap().disconnects, 1);
    }

    #[tokio::test]
    async fn test_connect_failure_goes_to_backoff() {
        let transport = FakeTransport {
            connect_failures: 1,
            ..FakeTransport::finding(esp32())
        };
        let mut sup = supervisor(transport);

        let next = sup.step(SupervisorState::Connected(esp32())).await.unwrap();
        assert_eq!(next, SupervisorState::Backoff);
    }

    #[tokio::test]
    async fn test_backoff_to_searching() {
        let mut sup = supervisor(FakeTransport::new());

        let next = sup.step(SupervisorState::Backoff).await.unwrap();
        assert_eq!(next, SupervisorState::Searching);
    }

    #[tokio::test]
    async fn test_initial_exhaustion_is_fatal() {
        let mut sup = supervisor(FakeTransport::new());
        let log = sup.transport.log.clone();

        let err = sup.run().await.unwrap_err();
        assert!(matches!(
            err,
            StatlinkError::DeviceUnreachable { ref name, attempts: 2 } if name == "ESP32_TaskManager"
        ));
        assert_eq!(log.lock().unwrap().sweeps.len(), 2);
        assert!(log.lock().unwrap().connects.is_empty());
    }

    #[tokio::test]
    async fn test_exhaustion_after_connection_backs_off() {
        let mut sup = supervisor(FakeTransport::new());
        sup.step(SupervisorState::Connected(esp32())).await.unwrap();

        let next = sup.step(SupervisorState::Searching).await.unwrap();
        assert_eq!(next, SupervisorState::Backoff);
    }

    #[tokio::test]
    async fn test_failing_sessions_loop_forever() {
        let transport = FakeTransport {
            writes_per_link: 2,
            ..FakeTransport::finding(esp32())
        };
        let mut sup = supervisor(transport);
        let log = sup.transport.log.clone();

        let outcome = tokio::time::timeout(Duration::from_millis(300), sup.run()).await;
        assert!(outcome.is_err(), "supervisor exited: {outcome:?}");

        let log = log.lock().unwrap();
        assert!(log.connects.len() > 3, "only {} connects", log.connects.len());
        assert_eq!(log.max_live_links, 1);
        assert!(log.disconnects + 1 >= log.connects.len());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SupervisorState::Searching.to_string(), "searching");
        assert_eq!(SupervisorState::Backoff.to_string(), "backoff");
        assert_eq!(
            SupervisorState::Connected(esp32()).to_string(),
            "connected to ESP32_TaskManager (AA:BB:CC:DD:EE:FF)"
        );
    }
}
