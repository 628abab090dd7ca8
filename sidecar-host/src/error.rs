use std::panic::Location;
use std::path::PathBuf;

use error_location::ErrorLocation;
use sidecar_config::ConfigError;
use sidecar_supervisor::SupervisorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HostError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("Logging setup failed: {message} {location}")]
    Logging {
        message: String,
        location: ErrorLocation,
    },

    #[error("Failed to write port file {path}: {source} {location}")]
    PortFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("IO error: {source} {location}")]
    Io {
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("JSON error: {source} {location}")]
    Json {
        #[source]
        source: serde_json::Error,
        location: ErrorLocation,
    },

    #[error("TOML serialization error: {source} {location}")]
    Toml {
        #[source]
        source: toml::ser::Error,
        location: ErrorLocation,
    },
}

impl HostError {
    #[track_caller]
    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn port_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::PortFile {
            path: path.into(),
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<std::io::Error> for HostError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<serde_json::Error> for HostError {
    #[track_caller]
    fn from(source: serde_json::Error) -> Self {
        Self::Json {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<toml::ser::Error> for HostError {
    #[track_caller]
    fn from(source: toml::ser::Error) -> Self {
        Self::Toml {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

pub type HostResult<T> = std::result::Result<T, HostError>;
