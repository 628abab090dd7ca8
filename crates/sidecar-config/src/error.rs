use std::panic::Location;
use std::path::PathBuf;
use std::result::Result as StdResult;

use error_location::ErrorLocation;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum ConfigError {
    #[error("{category} error: {message} {location}")]
    Generic {
        category: &'static str,
        message: String,
        location: ErrorLocation,
    },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("TOML serialization error: {source}")]
    TomlSerialize {
        #[source]
        source: toml::ser::Error,
    },
}

impl ConfigError {
    #[track_caller]
    pub fn config(message: impl Into<String>) -> Self {
        Self::generic("Config", message)
    }

    /// Worker program, layout or launch resolution problem
    #[track_caller]
    pub fn worker(message: impl Into<String>) -> Self {
        Self::generic("Worker", message)
    }

    #[track_caller]
    pub fn handshake(message: impl Into<String>) -> Self {
        Self::generic("Handshake", message)
    }

    #[track_caller]
    pub fn health(message: impl Into<String>) -> Self {
        Self::generic("Health", message)
    }

    #[track_caller]
    pub fn resilience(message: impl Into<String>) -> Self {
        Self::generic("Resilience", message)
    }

    #[track_caller]
    fn generic(category: &'static str, message: impl Into<String>) -> Self {
        Self::Generic {
            category,
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

pub type ConfigErrorResult<T> = StdResult<T, ConfigError>;
