mod backoff_strategy;
mod config;
mod error;
mod handshake_config;
mod health_config;
mod launch_layout;
mod log_level;
mod logging_config;
mod resilience_config;
mod worker_config;
mod worker_launch;

#[cfg(test)]
mod tests;

pub use backoff_strategy::BackoffStrategy;
pub use config::{CONFIG_VERSION, SidecarConfig};
pub use error::{ConfigError, ConfigErrorResult};
pub use handshake_config::HandshakeConfig;
pub use health_config::HealthConfig;
pub use launch_layout::LaunchLayout;
pub use log_level::LogLevel;
pub use logging_config::LoggingConfig;
pub use resilience_config::ResilienceConfig;
pub use worker_config::WorkerConfig;
pub use worker_launch::WorkerLaunch;

/// Environment variable through which the supervisor tells the worker where
/// to publish its bound port.
pub const PORT_FILE_ENV: &str = "SIDECAR_PORT_FILE";

/// Environment variable that overrides the config directory.
pub const CONFIG_DIR_ENV: &str = "SIDECAR_CONFIG_DIR";

const CONFIG_FILENAME: &str = "config.toml";
const DEFAULT_CONFIG_DIR: &str = ".sidecar";

const DEFAULT_WORKER_PROGRAM: &str = "python3";
const DEFAULT_PORT_FILE_NAME: &str = "sidecar-worker-port.txt";
const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
const DEFAULT_STARTUP_TIMEOUT_MS: u64 = 5000;
const DEFAULT_HEALTH_PATH: &str = "/health";
const DEFAULT_HEALTH_TIMEOUT_MS: u64 = 2000;
const DEFAULT_MAX_RESTARTS: u32 = 3;
const DEFAULT_RESTART_DELAY_MS: u64 = 1000;
const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;
const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5000;
const DEFAULT_LOG_LEVEL: log::LevelFilter = log::LevelFilter::Info;
const DEFAULT_LOG_DIRECTORY: &str = "logs";
const DEFAULT_LOG_FILE_PREFIX: &str = "sidecar-host";
const DEFAULT_LOG_MAX_FILES: usize = 7;
