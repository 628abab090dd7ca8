use crate::AttemptFailure;

use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use error_location::ErrorLocation;
use sidecar_config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Failed to spawn worker '{program}': {source} {location}")]
    SpawnFailure {
        program: String,
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("Worker did not publish its port within {timeout_ms}ms {location}")]
    StartupTimeout {
        timeout_ms: u64,
        location: ErrorLocation,
    },

    #[error("Worker failed {attempts} consecutive attempts (last: {last_failure}) {location}")]
    CrashLoopExceeded {
        attempts: u32,
        last_failure: AttemptFailure,
        location: ErrorLocation,
    },

    #[error("Health check on port {port} failed: {message} {location}")]
    HealthCheckFailure {
        port: u16,
        message: String,
        location: ErrorLocation,
    },

    #[error("Worker has not been started {location}")]
    NotStarted { location: ErrorLocation },

    #[error("Worker was stopped before it became ready {location}")]
    Stopped { location: ErrorLocation },

    #[error("Supervisor is shutting down {location}")]
    ShuttingDown { location: ErrorLocation },

    #[error("Command '{command}' is not allowed {location}")]
    Unauthorized {
        command: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {source} {location}")]
    Io {
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("HTTP error: {source} {location}")]
    Http {
        #[source]
        source: reqwest::Error,
        location: ErrorLocation,
    },
}

impl SupervisorError {
    #[track_caller]
    pub fn spawn_failure(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::SpawnFailure {
            program: program.into(),
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn startup_timeout(timeout: Duration) -> Self {
        Self::StartupTimeout {
            timeout_ms: timeout.as_millis() as u64,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn crash_loop(attempts: u32, last_failure: AttemptFailure) -> Self {
        Self::CrashLoopExceeded {
            attempts,
            last_failure,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn health_check(port: u16, message: impl Into<String>) -> Self {
        Self::HealthCheckFailure {
            port,
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn not_started() -> Self {
        Self::NotStarted {
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn stopped() -> Self {
        Self::Stopped {
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn shutting_down() -> Self {
        Self::ShuttingDown {
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn unauthorized(command: impl Into<String>) -> Self {
        Self::Unauthorized {
            command: command.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Whether this error is recoverable via retry
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::HealthCheckFailure { .. }
                | Self::Http { .. }
                | Self::StartupTimeout { .. }
                | Self::Stopped { .. }
        )
    }

    pub fn recovery_hint(&self) -> &'static str {
        match self {
            Self::SpawnFailure { .. } => {
                "The worker executable could not be started. \
                   Check the configured program path and its permissions."
            }
            Self::StartupTimeout { .. } => {
                "The worker is taking too long to start. \
                   Try again or raise handshake.startup_timeout_ms."
            }
            Self::CrashLoopExceeded { .. } => {
                "Service unavailable: the worker keeps failing. \
                   Check the worker logs, then restart it manually."
            }
            Self::HealthCheckFailure { .. } => {
                "The worker is not responding. \
                   Starting it again will replace the unresponsive process."
            }
            Self::NotStarted { .. } => "The worker has not been started yet. Start it first.",
            Self::Stopped { .. } => "The worker was stopped. Start it again when needed.",
            Self::ShuttingDown { .. } => "The application is shutting down.",
            Self::Unauthorized { .. } => "This command is not available to the caller.",
            Self::Config(_) => {
                "Configuration file has invalid settings. \
                   Check the logs for details or delete the config file to use defaults."
            }
            _ => "An unexpected error occurred. Please check the logs for details.",
        }
    }
}

impl From<std::io::Error> for SupervisorError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<reqwest::Error> for SupervisorError {
    #[track_caller]
    fn from(source: reqwest::Error) -> Self {
        Self::Http {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SupervisorError>;

/// Outcome delivered to every caller attached to the same start attempt.
pub type SharedResult<T> = std::result::Result<T, Arc<SupervisorError>>;
