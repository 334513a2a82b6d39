//! In-memory fakes for driving the lifecycle in tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::bluetooth::{Link, LinkError, LinkResult, Transport};
use crate::metrics::{MetricSource, Usage};
use crate::temperature::TemperatureSource;
use crate::types::DeviceHandle;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

/// Metric source returning fixed readings.
#[derive(Clone)]
pub struct FakeMetrics {
    pub cpu: f64,
    pub memory: Usage,
    pub disk: Usage,
    pub battery: Option<f64>,
    pub disk_paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeMetrics {
    /// cpu 42%, ram 2048/8192 MiB, disk 100/500 GiB, battery 87%.
    pub fn scenario() -> Self {
        Self {
            cpu: 42.0,
            memory: Usage {
                used_bytes: 2048 * MIB,
                total_bytes: 8192 * MIB,
            },
            disk: Usage {
                used_bytes: 100 * GIB,
                total_bytes: 500 * GIB,
            },
            battery: Some(87.0),
            disk_paths: Arc::default(),
        }
    }
}

impl MetricSource for FakeMetrics {
    fn cpu_percent(&mut self) -> f64 {
        self.cpu
    }

    fn memory(&mut self) -> Usage {
        self.memory
    }

    fn disk_usage(&mut self, path: &Path) -> Usage {
        self.disk_paths.lock().unwrap().push(path.to_path_buf());
        self.disk
    }

    fn battery(&mut self) -> Option<f64> {
        self.battery
    }
}

/// Temperature source with a constant reading.
pub struct FixedTemperature(pub f64);

impl TemperatureSource for FixedTemperature {
    async fn fetch(&self) -> f64 {
        self.0
    }
}

/// Everything the fake radio was asked to do.
#[derive(Debug, Default)]
pub struct RadioLog {
    pub sweeps: Vec<String>,
    pub connects: Vec<DeviceHandle>,
    pub write_attempts: usize,
    pub payloads: Vec<Vec<u8>>,
    pub disconnects: usize,
    pub live_links: usize,
    pub max_live_links: usize,
}

/// Scripted transport.
///
/// Sweeps pop from `sweeps` and fall back to `default_sweep` once the script
/// is empty. Every link accepts `writes_per_link` writes and fails the next one.
#[derive(Default)]
pub struct FakeTransport {
    pub sweeps: VecDeque<LinkResult<Option<DeviceHandle>>>,
    pub default_sweep: Option<DeviceHandle>,
    pub connect_failures: usize,
    pub writes_per_link: usize,
    pub log: Arc<Mutex<RadioLog>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that always finds `device`.
    pub fn finding(device: DeviceHandle) -> Self {
        Self {
            default_sweep: Some(device),
            ..Self::new()
        }
    }
}

impl Transport for FakeTransport {
    type Link = FakeLink;

    async fn sweep(
        &mut self,
        target_name: &str,
        _timeout: Duration,
    ) -> LinkResult<Option<DeviceHandle>> {
        self.log.lock().unwrap().sweeps.push(target_name.to_string());
        self.sweeps
            .pop_front()
            .unwrap_or_else(|| Ok(self.default_sweep.clone()))
    }

    async fn connect(&mut self, device: &DeviceHandle) -> LinkResult<FakeLink> {
        let mut log = self.log.lock().unwrap();
        log.connects.push(device.clone());
        if self.connect_failures > 0 {
            self.connect_failures -= 1;
            return Err(LinkError::ConnectFailed {
                address: device.address.clone(),
                message: "le-connection-abort-by-local".to_string(),
            });
        }
        log.live_links += 1;
        log.max_live_links = log.max_live_links.max(log.live_links);
        Ok(FakeLink {
            address: device.address.clone(),
            remaining_writes: self.writes_per_link,
            log: Arc::clone(&self.log),
        })
    }
}

/// Link handed out by [`FakeTransport`].
pub struct FakeLink {
    address: String,
    remaining_writes: usize,
    log: Arc<Mutex<RadioLog>>,
}

impl Link for FakeLink {
    async fn write(&mut self, payload: &[u8]) -> LinkResult<()> {
        let mut log = self.log.lock().unwrap();
        log.write_attempts += 1;
        if self.remaining_writes == 0 {
            return Err(LinkError::WriteFailed {
                address: self.address.clone(),
                message: "Not connected".to_string(),
            });
        }
        self.remaining_writes -= 1;
        log.payloads.push(payload.to_vec());
        Ok(())
    }

    async fn disconnect(self) {
        let mut log = self.log.lock().unwrap();
        log.disconnects += 1;
        log.live_links -= 1;
    }
}
