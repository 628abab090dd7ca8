use crate::ConfigError;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How the delay between automatic restarts evolves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// Same delay before every restart
    #[default]
    Fixed,
    /// Delay doubles with each consecutive restart, capped at `max_backoff_ms`
    Exponential,
}

impl fmt::Display for BackoffStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => f.write_str("fixed"),
            Self::Exponential => f.write_str("exponential"),
        }
    }
}

impl FromStr for BackoffStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "exponential" => Ok(Self::Exponential),
            other => Err(ConfigError::resilience(format!(
                "unknown backoff strategy '{other}'"
            ))),
        }
    }
}
