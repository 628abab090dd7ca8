//! Logging setup with file rotation.

use crate::{HostError, HostResult};

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use sidecar_config::LoggingConfig;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

/// Setup logging with console and rotating file output for the host.
///
/// # Log Layers
/// - Console: human-readable, on stderr (stdout carries the command protocol)
/// - File: plain text, daily rotation, `max_files` retention
///
/// `RUST_LOG` wins over the configured level. `log` records (from the config
/// crate) are picked up by the subscriber's log bridge.
pub fn setup_logging(config_dir: &Path, logging: &LoggingConfig) -> HostResult<()> {
    let logs_dir = logs_dir(config_dir, logging);
    std::fs::create_dir_all(&logs_dir)?;

    let console_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(logging.max_files)
        .filename_prefix(&logging.file_prefix)
        .filename_suffix("log")
        .build(&logs_dir)
        .map_err(|e| HostError::logging(e.to_string()))?;

    let file_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_writer(file_appender);

    tracing_subscriber::registry()
        .with(env_filter(&logging.level.directive()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| HostError::logging(e.to_string()))
}

/// Console-only logging on stdout, for the stub worker. Its parent forwards
/// the lines into its own log.
pub fn setup_worker_logging(default_directive: &str) -> HostResult<()> {
    tracing_subscriber::registry()
        .with(env_filter(default_directive))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(std::io::stdout),
        )
        .try_init()
        .map_err(|e| HostError::logging(e.to_string()))
}

/// Directory the rolling files are written to. Relative `dir` values are
/// resolved against the config directory.
pub fn logs_dir(config_dir: &Path, logging: &LoggingConfig) -> PathBuf {
    config_dir.join(&logging.dir)
}

/// Get path to the current log file (for diagnostics). The appender dates
/// its files in UTC.
pub fn current_log_path(config_dir: &Path, logging: &LoggingConfig) -> PathBuf {
    let today = chrono::Utc::now().format("%Y-%m-%d");
    logs_dir(config_dir, logging).join(format!("{}.{}.log", logging.file_prefix, today))
}

fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}
