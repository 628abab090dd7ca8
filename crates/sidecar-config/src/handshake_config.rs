use crate::{
    ConfigError, ConfigErrorResult, DEFAULT_POLL_INTERVAL_MS, DEFAULT_PORT_FILE_NAME,
    DEFAULT_STARTUP_TIMEOUT_MS,
};

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where and how long to wait for the worker to publish its port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandshakeConfig {
    /// File name the worker writes its port into
    pub port_file_name: String,
    /// Directory holding the port file (defaults to the OS temp directory)
    pub directory: Option<PathBuf>,
    /// Delay between reads of the port file
    pub poll_interval_ms: u64,
    /// Overall deadline for the port file to appear with valid content
    pub startup_timeout_ms: u64,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            port_file_name: String::from(DEFAULT_PORT_FILE_NAME),
            directory: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            startup_timeout_ms: DEFAULT_STARTUP_TIMEOUT_MS,
        }
    }
}

impl HandshakeConfig {
    /// Full path of the well-known port file.
    pub fn port_file_path(&self) -> PathBuf {
        let dir = self
            .directory
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        dir.join(&self.port_file_name)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn validate(&self) -> ConfigErrorResult<()> {
        let name = Path::new(&self.port_file_name);
        if self.port_file_name.is_empty()
            || name.file_name().map(|n| n != name.as_os_str()).unwrap_or(true)
        {
            return Err(ConfigError::handshake(format!(
                "handshake.port_file_name must be a bare file name, got '{}'",
                self.port_file_name
            )));
        }

        if self.poll_interval_ms == 0 {
            return Err(ConfigError::handshake(
                "handshake.poll_interval_ms must be > 0",
            ));
        }

        if self.startup_timeout_ms < self.poll_interval_ms {
            return Err(ConfigError::handshake(format!(
                "handshake.startup_timeout_ms ({}) must be >= poll_interval_ms ({})",
                self.startup_timeout_ms, self.poll_interval_ms
            )));
        }

        Ok(())
    }
}
