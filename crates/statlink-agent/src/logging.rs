//! Logging initialization.
//!
//! Stdout always gets a human-readable (or JSON) layer in the configured
//! format. When `logging.directory` is set, JSON logs are also written to a
//! daily rolling file there.

use std::path::Path;
use std::sync::OnceLock;

use anyhow::Context;
use statlink_core::{LogFormat, LoggingConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

/// Static guards to keep non-blocking writers alive.
/// These must persist for the lifetime of the program.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static STDOUT_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize the global subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`.
///
/// # Errors
///
/// Returns an error if the filter cannot be parsed, the log directory cannot
/// be created, or a global subscriber is already installed.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter = build_filter(&config.level)?;

    let mut layers = vec![stdout_layer(config.format)];
    if let Some(dir) = &config.directory {
        layers.push(file_layer(dir)?);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    Ok(())
}

fn build_filter(level: &str) -> anyhow::Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level '{level}'"))
}

fn stdout_layer(format: LogFormat) -> BoxedLayer {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());
    let _ = STDOUT_GUARD.set(guard);

    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        // No ANSI colors for journald
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .boxed(),
    }
}

fn file_layer(dir: &Path) -> anyhow::Result<BoxedLayer> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;

    // Rolling file appender - creates new file daily
    let appender = RollingFileAppender::new(Rotation::DAILY, dir, "statlink");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);

    Ok(tracing_subscriber::fmt::layer()
        .json()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .boxed())
}
