//! Application configuration management.
//!
//! Handles loading and validating statlink configuration including:
//! - The peripheral to look for and the characteristic to write to
//! - Discovery sweep and retry timing
//! - Session backoff and sampling settings
//! - The remote sensor endpoint and its credentials
//! - Logging output
//!
//! Values are layered with the `config` crate: built-in defaults, then an
//! optional TOML file, then `STATLINK__<SECTION>__<KEY>` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "STATLINK";

/// Advertised name of the peripheral firmware.
pub const DEFAULT_DEVICE_NAME: &str = "ESP32_TaskManager";

/// GATT characteristic the peripheral exposes for telemetry writes.
pub const DEFAULT_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0xabcdef12_3456_7890_abcd_ef1234567890);

/// Sensor node label looked up in the remote monitoring tree.
pub const DEFAULT_SENSOR_LABEL: &str = "Core Average";

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested configuration file does not exist.
    #[error("Configuration file not found at: {}", .0.display())]
    NotFound(PathBuf),

    /// The layered sources could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A single field holds an invalid value.
    #[error("Invalid value for '{field}': {message}")]
    ValidationError {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// Several fields failed validation.
    #[error("{} configuration fields are invalid", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Peripheral identification.
    pub device: DeviceConfig,

    /// Discovery sweep settings.
    pub discovery: DiscoveryConfig,

    /// Streaming session settings.
    pub session: SessionConfig,

    /// Remote sensor endpoint.
    pub remote: RemoteConfig,

    /// Logging output.
    pub logging: LoggingConfig,
}

/// Which peripheral to stream to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Advertised name the peripheral must match exactly.
    pub name: String,

    /// Characteristic the payload is written to.
    pub characteristic_uuid: Uuid,

    /// BlueZ adapter name (e.g. `hci0`). Uses the default adapter when unset.
    pub adapter: Option<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_DEVICE_NAME.to_string(),
            characteristic_uuid: DEFAULT_CHARACTERISTIC_UUID,
            adapter: None,
        }
    }
}

/// Discovery sweep settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Number of sweeps before giving up.
    pub max_attempts: u32,

    /// Duration of a single sweep.
    pub sweep_timeout_ms: u64,

    /// Pause between two unsuccessful sweeps.
    pub retry_delay_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            sweep_timeout_ms: 5_000,
            retry_delay_ms: 2_000,
        }
    }
}

impl DiscoveryConfig {
    /// Duration of a single sweep.
    #[must_use]
    pub const fn sweep_timeout(&self) -> Duration {
        Duration::from_millis(self.sweep_timeout_ms)
    }

    /// Pause between two unsuccessful sweeps.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Streaming session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Delay after a lost session before scanning again.
    pub backoff_ms: u64,

    /// CPU measurement window. This also paces the write loop.
    pub cpu_window_ms: u64,

    /// Filesystem path whose disk usage is reported.
    pub disk_path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backoff_ms: 5_000,
            cpu_window_ms: 1_000,
            disk_path: PathBuf::from("/"),
        }
    }
}

impl SessionConfig {
    /// Delay after a lost session before scanning again.
    #[must_use]
    pub const fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    /// CPU measurement window.
    #[must_use]
    pub const fn cpu_window(&self) -> Duration {
        Duration::from_millis(self.cpu_window_ms)
    }
}

/// Remote sensor endpoint (a LibreHardwareMonitor-style `data.json`).
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// URL of the JSON sensor tree.
    pub url: String,

    /// Basic-auth user name. No authentication is sent when empty.
    pub username: String,

    /// Basic-auth password.
    pub password: Option<String>,

    /// Hard timeout for one request.
    pub timeout_ms: u64,

    /// Label of the sensor node to read.
    pub sensor_label: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8085/data.json".to_string(),
            username: "admin".to_string(),
            password: None,
            timeout_ms: 5_000,
            sensor_label: DEFAULT_SENSOR_LABEL.to_string(),
        }
    }
}

impl RemoteConfig {
    /// Hard timeout for one request.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// Hand-written so the password never ends up in logs.
impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("timeout_ms", &self.timeout_ms)
            .field("sensor_label", &self.sensor_label)
            .finish()
    }
}

/// Log line format on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human readable output.
    #[default]
    Pretty,
    /// Single-line output, suitable for journald.
    Compact,
    /// One JSON object per line.
    Json,
}

/// Logging output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,

    /// Stdout format.
    pub format: LogFormat,

    /// When set, JSON logs are also written to daily rolling files here.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            directory: None,
        }
    }
}

impl Config {
    /// Load configuration from defaults, a TOML file and the environment.
    ///
    /// With `Some(path)` the file must exist. With `None` the platform config
    /// file (see [`Config::default_path`]) is used if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the explicit file is missing, a source cannot be
    /// parsed, or the merged configuration fails validation.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                if let Some(default_path) = Self::default_path() {
                    builder = builder.add_source(config::File::from(default_path).required(false));
                }
            }
        }

        let merged: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        merged.validate()?;
        Ok(merged)
    }

    /// Platform configuration file location, e.g. `~/.config/statlink/config.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "statlink")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Check every field, collecting all problems instead of stopping at the first.
    ///
    /// # Errors
    ///
    /// Returns a single [`ConfigError::ValidationError`] or
    /// [`ConfigError::MultipleValidationErrors`].
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if self.device.name.trim().is_empty() {
            errors.push(invalid("device.name", "must not be empty"));
        }
        if self.device.characteristic_uuid.is_nil() {
            errors.push(invalid("device.characteristic_uuid", "must not be the nil UUID"));
        }
        if self.discovery.max_attempts == 0 {
            errors.push(invalid("discovery.max_attempts", "must be at least 1"));
        }
        if self.discovery.sweep_timeout_ms == 0 {
            errors.push(invalid("discovery.sweep_timeout_ms", "must be greater than 0"));
        }
        if self.remote.timeout_ms == 0 {
            errors.push(invalid("remote.timeout_ms", "must be greater than 0"));
        }
        if !self.remote.url.starts_with("http://") && !self.remote.url.starts_with("https://") {
            errors.push(invalid(
                "remote.url",
                format!("'{}' is not an http(s) URL", self.remote.url),
            ));
        }
        if self.remote.sensor_label.is_empty() {
            errors.push(invalid("remote.sensor_label", "must not be empty"));
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }
}

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field,
        message: message.into(),
    }
}
