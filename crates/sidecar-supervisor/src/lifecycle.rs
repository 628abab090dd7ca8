use std::fmt;

use serde::Serialize;

/// Lifecycle of the supervised worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    /// Nothing running and nothing pending
    #[default]
    Idle,
    /// A spawn attempt (or a scheduled restart) is in flight
    Starting,
    /// Handshake succeeded, port known
    Running,
    /// Port known but the last probe failed
    Unhealthy,
    /// Restart budget exhausted; only an explicit start recovers
    Failed,
}

impl Lifecycle {
    /// Whether a port is expected to be known in this state.
    pub fn has_port(self) -> bool {
        matches!(self, Self::Running | Self::Unhealthy)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Unhealthy => "unhealthy",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}
