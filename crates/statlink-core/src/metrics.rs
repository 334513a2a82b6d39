//! Local host metrics.
//!
//! [`MetricSource`] is the synchronous interface the sampler reads from.
//! [`SystemMetrics`] implements it with `sysinfo` for CPU and memory, `statvfs`
//! for disk usage, and reads the battery from the Linux `power_supply` class in
//! sysfs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::sys::statvfs::statvfs;
use sysinfo::System;
use tracing::debug;

/// Used/total pair in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Usage {
    /// Bytes in use.
    pub used_bytes: u64,
    /// Total bytes.
    pub total_bytes: u64,
}

/// Synchronous access to local host metrics.
///
/// Implementations never fail: a reading that cannot be taken is reported as
/// zero (or `None` for the battery).
pub trait MetricSource: Send {
    /// Global CPU usage in percent. Blocks for the measurement window.
    fn cpu_percent(&mut self) -> f64;

    /// Physical memory usage.
    fn memory(&mut self) -> Usage;

    /// Usage of the filesystem containing `path`.
    fn disk_usage(&mut self, path: &Path) -> Usage;

    /// Battery charge in percent, `None` when the host has no battery.
    fn battery(&mut self) -> Option<f64>;
}

/// [`MetricSource`] backed by `sysinfo`, `statvfs` and sysfs.
pub struct SystemMetrics {
    system: System,
    cpu_window: Duration,
    power_supply_root: PathBuf,
}

impl SystemMetrics {
    /// Create a source that measures CPU usage over `cpu_window`.
    ///
    /// The window is never shorter than sysinfo's minimum update interval.
    #[must_use]
    pub fn new(cpu_window: Duration) -> Self {
        Self {
            system: System::new(),
            cpu_window: cpu_window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL),
            power_supply_root: PathBuf::from("/sys/class/power_supply"),
        }
    }

    /// Read batteries from a different sysfs root.
    #[must_use]
    pub fn with_power_supply_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.power_supply_root = root.into();
        self
    }
}

impl MetricSource for SystemMetrics {
    fn cpu_percent(&mut self) -> f64 {
        self.system.refresh_cpu_usage();
        std::thread::sleep(self.cpu_window);
        self.system.refresh_cpu_usage();
        f64::from(self.system.global_cpu_usage())
    }

    fn memory(&mut self) -> Usage {
        self.system.refresh_memory();
        Usage {
            used_bytes: self.system.used_memory(),
            total_bytes: self.system.total_memory(),
        }
    }

    // Block counts are 32-bit on some targets.
    #[allow(clippy::useless_conversion)]
    fn disk_usage(&mut self, path: &Path) -> Usage {
        match statvfs(path) {
            Ok(stat) => usage_from_blocks(
                u64::from(stat.blocks()),
                u64::from(stat.blocks_free()),
                u64::from(stat.fragment_size()),
            ),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "statvfs failed");
                Usage::default()
            }
        }
    }

    fn battery(&mut self) -> Option<f64> {
        read_battery_capacity(&self.power_supply_root)
    }
}

/// Used space excludes free blocks reserved for root.
const fn usage_from_blocks(blocks: u64, blocks_free: u64, fragment_size: u64) -> Usage {
    Usage {
        used_bytes: blocks.saturating_sub(blocks_free).saturating_mul(fragment_size),
        total_bytes: blocks.saturating_mul(fragment_size),
    }
}

/// Average capacity of all `Battery` supplies under `root`.
fn read_battery_capacity(root: &Path) -> Option<f64> {
    let entries = std::fs::read_dir(root).ok()?;

    let capacities: Vec<f64> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|dir| {
            std::fs::read_to_string(dir.join("type")).is_ok_and(|kind| kind.trim() == "Battery")
        })
        .filter_map(|dir| std::fs::read_to_string(dir.join("capacity")).ok())
        .filter_map(|raw| raw.trim().parse::<f64>().ok())
        .filter(|capacity| (0.0..=100.0).contains(capacity))
        .collect();

    if capacities.is_empty() {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let count = capacities.len() as f64;
    Some(capacities.iter().sum::<f64>() / count)
}
