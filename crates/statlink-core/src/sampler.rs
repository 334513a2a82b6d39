//! Builds one [`TelemetrySample`] per tick from the local and remote sources.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::error;

use crate::metrics::{MetricSource, Usage};
use crate::temperature::TemperatureSource;
use crate::types::{bytes_to_gib, bytes_to_mib, TelemetrySample};

/// Local readings taken on the blocking pool.
#[derive(Debug, Default)]
struct LocalReadings {
    cpu_percent: f64,
    memory: Usage,
    disk: Usage,
    battery: Option<f64>,
}

/// Combines a [`MetricSource`] and a [`TemperatureSource`] into samples.
pub struct Sampler<M, T> {
    metrics: Arc<Mutex<M>>,
    temperature: T,
    disk_path: PathBuf,
}

impl<M, T> Sampler<M, T>
where
    M: MetricSource + 'static,
    T: TemperatureSource,
{
    /// Create a sampler reporting disk usage for `disk_path`.
    pub fn new(metrics: M, temperature: T, disk_path: impl Into<PathBuf>) -> Self {
        Self {
            metrics: Arc::new(Mutex::new(metrics)),
            temperature,
            disk_path: disk_path.into(),
        }
    }

    /// Take a fresh, fully populated sample.
    ///
    /// Local metrics are read on the blocking pool since CPU sampling sleeps
    /// for its measurement window. Unavailable values become sentinels.
    pub async fn sample(&self) -> TelemetrySample {
        let local = self.read_local().await;
        let temperature_c = self.temperature.fetch().await;

        TelemetrySample {
            cpu_percent: local.cpu_percent,
            ram_used_mb: bytes_to_mib(local.memory.used_bytes),
            ram_total_mb: bytes_to_mib(local.memory.total_bytes),
            disk_used_gb: bytes_to_gib(local.disk.used_bytes),
            disk_total_gb: bytes_to_gib(local.disk.total_bytes),
            battery_percent: local.battery.unwrap_or(0.0),
            temperature_c,
        }
    }

    async fn read_local(&self) -> LocalReadings {
        let metrics = Arc::clone(&self.metrics);
        let disk_path = self.disk_path.clone();

        let readings = tokio::task::spawn_blocking(move || {
            let mut source = metrics.lock().unwrap_or_else(PoisonError::into_inner);
            LocalReadings {
                cpu_percent: source.cpu_percent(),
                memory: source.memory(),
                disk: source.disk_usage(&disk_path),
                battery: source.battery(),
            }
        })
        .await;

        readings.unwrap_or_else(|e| {
            error!(error = %e, "Local metric collection panicked");
            LocalReadings::default()
        })
    }
}
