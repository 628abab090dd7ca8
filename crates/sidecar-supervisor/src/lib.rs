mod attempt_failure;
mod attempt_id;
mod error;
mod health_prober;
mod lifecycle;
mod port_handshake;
mod restart_policy;
mod service_snapshot;
mod service_state;
mod supervisor;
mod supervisor_actor;
mod supervisor_command;
mod supervisor_event;
mod worker_process;

#[cfg(test)]
mod tests;

pub use attempt_failure::AttemptFailure;
pub use attempt_id::AttemptId;
pub use error::{Result, SharedResult, SupervisorError};
pub use health_prober::HealthProber;
pub use lifecycle::Lifecycle;
pub use port_handshake::{PortHandshake, parse_port};
pub use restart_policy::{RestartDecision, RestartPolicy};
pub use service_snapshot::ServiceSnapshot;
pub use supervisor::{Supervisor, SupervisorOptions};
pub use supervisor_event::SupervisorEvent;
pub use worker_process::{WorkerExit, WorkerProcess};
