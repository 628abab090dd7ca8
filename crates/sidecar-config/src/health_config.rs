use crate::{ConfigError, ConfigErrorResult, DEFAULT_HEALTH_PATH, DEFAULT_HEALTH_TIMEOUT_MS};

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Liveness endpoint path on the worker
    pub path: String,
    /// Upper bound on a single probe
    pub timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            path: String::from(DEFAULT_HEALTH_PATH),
            timeout_ms: DEFAULT_HEALTH_TIMEOUT_MS,
        }
    }
}

impl HealthConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> ConfigErrorResult<()> {
        if !self.path.starts_with('/') {
            return Err(ConfigError::health(format!(
                "health.path must start with '/', got '{}'",
                self.path
            )));
        }

        if self.timeout_ms == 0 {
            return Err(ConfigError::health("health.timeout_ms must be > 0"));
        }

        Ok(())
    }
}
