use crate::{
    BackoffStrategy, ConfigError, ConfigErrorResult, DEFAULT_MAX_BACKOFF_MS, DEFAULT_MAX_RESTARTS,
    DEFAULT_RESTART_DELAY_MS, DEFAULT_SHUTDOWN_TIMEOUT_MS,
};

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const MAX_MAX_RESTARTS: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Automatic restarts allowed before the worker is declared failed
    pub max_restarts: u32,
    /// Delay before each automatic restart
    pub restart_delay_ms: u64,
    /// Delay strategy between consecutive restarts
    pub backoff: BackoffStrategy,
    /// Cap for exponential backoff
    pub max_backoff_ms: u64,
    /// Grace period after the stop signal before the worker is killed
    pub shutdown_timeout_ms: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_restarts: DEFAULT_MAX_RESTARTS,
            restart_delay_ms: DEFAULT_RESTART_DELAY_MS,
            backoff: BackoffStrategy::default(),
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

impl ResilienceConfig {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn validate(&self) -> ConfigErrorResult<()> {
        if self.max_restarts > MAX_MAX_RESTARTS {
            return Err(ConfigError::resilience(format!(
                "resilience.max_restarts must be 0-{}, got {}",
                MAX_MAX_RESTARTS, self.max_restarts
            )));
        }

        if self.backoff == BackoffStrategy::Exponential
            && self.max_backoff_ms < self.restart_delay_ms
        {
            return Err(ConfigError::resilience(format!(
                "resilience.max_backoff_ms ({}) must be >= restart_delay_ms ({})",
                self.max_backoff_ms, self.restart_delay_ms
            )));
        }

        if self.shutdown_timeout_ms == 0 {
            return Err(ConfigError::resilience(
                "resilience.shutdown_timeout_ms must be > 0",
            ));
        }

        Ok(())
    }
}
