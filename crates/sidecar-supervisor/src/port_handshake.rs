//! Port discovery through a file written by the worker.

use crate::{Result, SupervisorError};

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sidecar_config::HandshakeConfig;
use tokio::time::{Instant, sleep};
use tracing::{debug, trace};

/// Polls the well-known port file until it holds a valid port or the
/// deadline passes.
#[derive(Debug, Clone)]
pub struct PortHandshake {
    path: PathBuf,
    poll_interval: Duration,
    timeout: Duration,
}

impl PortHandshake {
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            poll_interval,
            timeout,
        }
    }

    pub fn from_config(config: &HandshakeConfig) -> Self {
        Self::new(
            config.port_file_path(),
            config.poll_interval(),
            config.startup_timeout(),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Remove a leftover port file so a previous run's port is never read.
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Removed stale port file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SupervisorError::from(e)),
        }
    }

    /// Single read of the port file. Missing or malformed content is `None`.
    pub async fn read_once(&self) -> Option<u16> {
        let contents = tokio::fs::read_to_string(&self.path).await.ok()?;
        let port = parse_port(&contents);
        if port.is_none() {
            trace!(path = %self.path.display(), "Port file not ready: {contents:?}");
        }
        port
    }

    /// Poll until a valid port is published.
    ///
    /// Malformed content means the worker is still writing; polling continues
    /// until the deadline, then `StartupTimeout` is returned.
    pub async fn wait_for_port(&self) -> Result<u16> {
        let started = Instant::now();
        let deadline = started + self.timeout;

        loop {
            if let Some(port) = self.read_once().await {
                debug!(
                    port,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Port handshake complete"
                );
                return Ok(port);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(SupervisorError::startup_timeout(self.timeout));
            }

            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

/// Parse decimal port text. Zero and anything outside `u16` are rejected.
pub fn parse_port(contents: &str) -> Option<u16> {
    match contents.trim().parse::<u16>() {
        Ok(0) | Err(_) => None,
        Ok(port) => Some(port),
    }
}
