use std::fmt;

use serde::Serialize;

/// Why a single spawn attempt did not end in a running worker.
///
/// Every variant counts against the same restart budget; the distinction is
/// kept for events, snapshots and the final crash-loop error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(
    tag = "kind",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum AttemptFailure {
    /// The OS refused to create the process
    SpawnFailed { message: String },
    /// No valid port appeared in the handshake file before the deadline
    StartupTimeout { timeout_ms: u64 },
    /// The process exited before publishing its port
    ExitedDuringStartup {
        code: Option<i32>,
        signal: Option<i32>,
    },
    /// The process exited on its own after it was running
    Crashed {
        code: Option<i32>,
        signal: Option<i32>,
    },
}

impl AttemptFailure {
    pub fn is_exit(&self) -> bool {
        matches!(
            self,
            Self::ExitedDuringStartup { .. } | Self::Crashed { .. }
        )
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpawnFailed { message } => write!(f, "spawn failed: {message}"),
            Self::StartupTimeout { timeout_ms } => {
                write!(f, "no port published within {timeout_ms}ms")
            }
            Self::ExitedDuringStartup { code, signal } => {
                write!(f, "exited during startup ({})", describe_exit(*code, *signal))
            }
            Self::Crashed { code, signal } => {
                write!(f, "crashed ({})", describe_exit(*code, *signal))
            }
        }
    }
}

pub(crate) fn describe_exit(code: Option<i32>, signal: Option<i32>) -> String {
    match (code, signal) {
        (Some(code), _) => format!("exit code {code}"),
        (None, Some(signal)) => format!("signal {signal}"),
        (None, None) => String::from("unknown status"),
    }
}
