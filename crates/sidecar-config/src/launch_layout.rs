use crate::ConfigError;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Installation layout the worker is launched from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchLayout {
    /// Program and arguments used as configured (source checkout, system interpreter)
    #[default]
    Development,
    /// Program and arguments resolved under a bundled resources root
    Packaged,
}

impl fmt::Display for LaunchLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => f.write_str("development"),
            Self::Packaged => f.write_str("packaged"),
        }
    }
}

impl FromStr for LaunchLayout {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "packaged" | "production" => Ok(Self::Packaged),
            other => Err(ConfigError::worker(format!(
                "unknown launch layout '{other}'"
            ))),
        }
    }
}
