use crate::{AttemptFailure, AttemptId};

use serde::Serialize;

/// Notifications broadcast to the host as the worker changes state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(
    tag = "event",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum SupervisorEvent {
    Spawned {
        attempt: AttemptId,
        pid: Option<u32>,
    },
    Started {
        attempt: AttemptId,
        port: u16,
        elapsed_ms: u64,
    },
    AttemptFailed {
        attempt: AttemptId,
        failure: AttemptFailure,
        restart_count: u32,
    },
    Restarting {
        restart_count: u32,
        delay_ms: u64,
    },
    Unhealthy {
        port: u16,
    },
    Recovered {
        port: u16,
    },
    /// Emitted once when the restart budget runs out
    CrashLoopExceeded {
        attempts: u32,
        last_failure: AttemptFailure,
    },
    Stopped,
}
