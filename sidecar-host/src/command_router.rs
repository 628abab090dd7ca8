//! Allowlisted command boundary in front of the supervisor.

use crate::commands::{
    CommandResponse, ErrorResponse, HealthResponse, PortResponse, StartResponse, StatusResponse,
};

use std::fmt;

use sidecar_supervisor::{Supervisor, SupervisorError};
use tracing::{debug, warn};

/// Commands the host accepts. Everything else is rejected before it reaches
/// the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerCommand {
    Start,
    Health,
    GetPort,
    Status,
}

impl WorkerCommand {
    pub const ALL: [WorkerCommand; 4] = [Self::Start, Self::Health, Self::GetPort, Self::Status];

    /// Canonical namespaced name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Start => "worker:start",
            Self::Health => "worker:health",
            Self::GetPort => "worker:get-port",
            Self::Status => "worker:status",
        }
    }

    /// Short camelCase name.
    pub fn alias(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Health => "healthCheck",
            Self::GetPort => "getPort",
            Self::Status => "status",
        }
    }

    /// Exact match against the name or the alias.
    pub fn lookup(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name() == name || c.alias() == name)
    }
}

impl fmt::Display for WorkerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone)]
pub struct CommandRouter {
    supervisor: Supervisor,
}

impl CommandRouter {
    pub fn new(supervisor: Supervisor) -> Self {
        Self { supervisor }
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn authorize(name: &str) -> Result<WorkerCommand, SupervisorError> {
        WorkerCommand::lookup(name).ok_or_else(|| SupervisorError::unauthorized(name))
    }

    /// Authorize and run one command. Never fails; errors become
    /// [`ErrorResponse`]s.
    pub async fn dispatch(&self, name: &str) -> CommandResponse {
        match Self::authorize(name) {
            Ok(command) => {
                debug!(%command, "Dispatching command");
                self.execute(command).await
            }
            Err(e) => {
                warn!("Rejected command: {e}");
                CommandResponse::Error(ErrorResponse::from(&e))
            }
        }
    }

    pub async fn execute(&self, command: WorkerCommand) -> CommandResponse {
        match command {
            WorkerCommand::Start => match self.supervisor.start().await {
                Ok(port) => CommandResponse::Start(StartResponse::new(port)),
                Err(e) => CommandResponse::Error(ErrorResponse::from(e.as_ref())),
            },
            WorkerCommand::Health => match self.supervisor.check_health().await {
                Ok(port) => CommandResponse::Health(HealthResponse::healthy(port)),
                Err(e @ SupervisorError::HealthCheckFailure { .. }) => CommandResponse::Health(
                    HealthResponse::unhealthy(self.supervisor.port(), e.to_string()),
                ),
                Err(e) => CommandResponse::Error(ErrorResponse::from(&e)),
            },
            WorkerCommand::GetPort => {
                CommandResponse::Port(PortResponse::new(self.supervisor.port()))
            }
            WorkerCommand::Status => {
                CommandResponse::Status(StatusResponse::from(self.supervisor.snapshot()))
            }
        }
    }
}
