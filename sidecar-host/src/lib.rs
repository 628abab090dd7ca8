//! sidecar-host - runs the worker supervisor behind a JSON-lines command
//! channel, plus a reference worker for manual runs and tests.

pub mod cli;
pub mod command_router;
pub mod commands;
pub mod error;
pub mod host;
pub mod logging;
pub mod stub_worker;

#[cfg(test)]
mod tests;

pub use command_router::{CommandRouter, WorkerCommand};
pub use error::{HostError, HostResult};
pub use host::Host;
