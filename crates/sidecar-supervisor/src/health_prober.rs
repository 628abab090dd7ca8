//! Liveness probing of the worker's HTTP endpoint.

use crate::{Result, SupervisorError};

use std::time::{Duration, Instant};

use sidecar_config::HealthConfig;
use tracing::debug;

/// Issues single bounded-latency probes against `http://127.0.0.1:<port><path>`.
///
/// Stateless apart from the connection pool, so clones can probe concurrently.
#[derive(Debug, Clone)]
pub struct HealthProber {
    client: reqwest::Client,
    path: String,
    timeout: Duration,
}

impl HealthProber {
    pub fn new(path: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(1)
            .no_proxy()
            .build()?;

        Ok(Self {
            client,
            path: path.into(),
            timeout,
        })
    }

    pub fn from_config(config: &HealthConfig) -> Result<Self> {
        Self::new(config.path.clone(), config.timeout())
    }

    pub fn url(&self, port: u16) -> String {
        format!("http://127.0.0.1:{port}{}", self.path)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe once; any non-2xx status or request failure is unhealthy.
    /// Returns the round-trip latency on success.
    pub async fn probe(&self, port: u16) -> Result<Duration> {
        let start = Instant::now();
        let url = self.url(port);

        match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let latency = start.elapsed();
                debug!(port, latency_ms = latency.as_millis() as u64, "Health probe ok");
                Ok(latency)
            }
            Ok(resp) => Err(SupervisorError::health_check(
                port,
                format!("HTTP {}", resp.status()),
            )),
            Err(e) if e.is_timeout() => Err(SupervisorError::health_check(
                port,
                format!("no response within {}ms", self.timeout.as_millis()),
            )),
            Err(e) => Err(SupervisorError::health_check(port, e.to_string())),
        }
    }

    pub async fn is_healthy(&self, port: u16) -> bool {
        self.probe(port).await.is_ok()
    }
}
