//! Response payloads of the host command channel.
//!
//! Every response carries `success`. Failures never expose Rust error types,
//! only the message and a recovery hint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sidecar_supervisor::{AttemptFailure, AttemptId, Lifecycle, ServiceSnapshot, SupervisorError};

/// One request line: `{"command":"start"}`, optionally with an `id` that is
/// echoed back on the response.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub id: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartResponse {
    pub success: bool,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub success: bool,
    pub healthy: bool,
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortResponse {
    pub success: bool,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub success: bool,
    pub lifecycle: Lifecycle,
    pub port: Option<u16>,
    pub restart_count: u32,
    pub pid: Option<u32>,
    pub attempt: Option<AttemptId>,
    pub last_failure: Option<AttemptFailure>,
    pub running_since: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandResponse {
    Start(StartResponse),
    Health(HealthResponse),
    Port(PortResponse),
    Status(StatusResponse),
    Error(ErrorResponse),
}

/// A response with the request id echoed back.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseLine {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(flatten)]
    pub response: CommandResponse,
}

impl StartResponse {
    pub fn new(port: u16) -> Self {
        Self {
            success: true,
            port,
        }
    }
}

impl HealthResponse {
    pub fn healthy(port: u16) -> Self {
        Self {
            success: true,
            healthy: true,
            port: Some(port),
            error: None,
        }
    }

    pub fn unhealthy(port: Option<u16>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            healthy: false,
            port,
            error: Some(error.into()),
        }
    }
}

impl PortResponse {
    pub fn new(port: Option<u16>) -> Self {
        Self {
            success: true,
            port,
        }
    }
}

impl From<ServiceSnapshot> for StatusResponse {
    fn from(snapshot: ServiceSnapshot) -> Self {
        Self {
            success: true,
            lifecycle: snapshot.lifecycle,
            port: snapshot.port,
            restart_count: snapshot.restart_count,
            pid: snapshot.pid,
            attempt: snapshot.attempt,
            last_failure: snapshot.last_failure,
            running_since: snapshot.running_since,
        }
    }
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            recovery_hint: None,
        }
    }
}

impl From<&SupervisorError> for ErrorResponse {
    fn from(error: &SupervisorError) -> Self {
        Self {
            success: false,
            error: error.to_string(),
            recovery_hint: Some(error.recovery_hint().to_string()),
        }
    }
}

impl CommandResponse {
    pub fn is_success(&self) -> bool {
        match self {
            Self::Start(r) => r.success,
            Self::Health(r) => r.success,
            Self::Port(r) => r.success,
            Self::Status(r) => r.success,
            Self::Error(r) => r.success,
        }
    }
}

impl ResponseLine {
    pub fn new(id: Option<Value>, response: CommandResponse) -> Self {
        Self { id, response }
    }
}
