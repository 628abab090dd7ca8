use crate::{AttemptFailure, AttemptId, Lifecycle};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Read-only view of the supervisor state, published on every change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSnapshot {
    pub lifecycle: Lifecycle,
    pub port: Option<u16>,
    pub restart_count: u32,
    pub pid: Option<u32>,
    pub attempt: Option<AttemptId>,
    pub last_failure: Option<AttemptFailure>,
    pub running_since: Option<DateTime<Utc>>,
}
