//! Cloneable handle to the supervisor task.

use crate::supervisor_actor::SupervisorActor;
use crate::supervisor_command::SupervisorCommand;
use crate::{
    HealthProber, Lifecycle, PortHandshake, RestartPolicy, Result, ServiceSnapshot, SharedResult,
    SupervisorError, SupervisorEvent,
};

use std::sync::Arc;
use std::time::{Duration, Instant};

use sidecar_config::{SidecarConfig, WorkerLaunch};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{Instrument, debug, info_span, warn};

const EVENT_CAPACITY: usize = 64;
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything the supervisor needs, already resolved from configuration.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub launch: WorkerLaunch,
    pub handshake: PortHandshake,
    pub health: HealthProber,
    pub restart: RestartPolicy,
    /// Grace period between the stop signal and a force kill
    pub shutdown_timeout: Duration,
}

impl SupervisorOptions {
    pub fn new(
        launch: WorkerLaunch,
        handshake: PortHandshake,
        health: HealthProber,
        restart: RestartPolicy,
    ) -> Self {
        Self {
            launch,
            handshake,
            health,
            restart,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn from_config(config: &SidecarConfig) -> Result<Self> {
        Ok(Self::new(
            config.resolve_launch()?,
            PortHandshake::from_config(&config.handshake),
            HealthProber::from_config(&config.health)?,
            RestartPolicy::from_config(&config.resilience),
        )
        .with_shutdown_timeout(config.resilience.shutdown_timeout()))
    }
}

/// Handle to one supervised worker.
///
/// Construct once at host startup and clone it into every caller. All state
/// changes are serialized through a single task; [`Supervisor::port`] and
/// [`Supervisor::snapshot`] read a published copy and never wait.
///
/// Call [`Supervisor::shutdown`] before exit. If every handle is dropped
/// instead, the task stops the worker on its own.
#[derive(Debug, Clone)]
pub struct Supervisor {
    commands: mpsc::UnboundedSender<SupervisorCommand>,
    state_rx: watch::Receiver<ServiceSnapshot>,
    events_tx: broadcast::Sender<SupervisorEvent>,
    health: HealthProber,
}

impl Supervisor {
    /// Start the supervisor task. Must be called inside a Tokio runtime.
    pub fn new(options: SupervisorOptions) -> Self {
        let (commands, mailbox) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ServiceSnapshot::default());
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let health = options.health.clone();

        let actor = SupervisorActor::new(
            options,
            mailbox,
            commands.downgrade(),
            state_tx,
            events_tx.clone(),
        );
        tokio::spawn(actor.run().instrument(info_span!("supervisor")));

        Self {
            commands,
            state_rx,
            events_tx,
            health,
        }
    }

    pub fn from_config(config: &SidecarConfig) -> Result<Self> {
        Ok(Self::new(SupervisorOptions::from_config(config)?))
    }

    /// Ensure the worker is running and return its port.
    ///
    /// Concurrent callers share one spawn attempt and receive the same
    /// outcome. A running worker is probed first; if the probe fails the old
    /// process is replaced.
    pub async fn start(&self) -> SharedResult<u16> {
        let snapshot = self.snapshot();
        let mut stale = None;

        if snapshot.lifecycle.has_port()
            && let Some(port) = snapshot.port
            && let Some(attempt) = snapshot.attempt
        {
            let probe_started = Instant::now();
            match self.health.probe(port).await {
                Ok(latency) => {
                    if snapshot.lifecycle == Lifecycle::Unhealthy {
                        self.send(SupervisorCommand::MarkRecovered { attempt });
                    }
                    debug!(
                        %attempt,
                        port,
                        latency_ms = latency.as_millis() as u64,
                        "Worker already running"
                    );
                    return Ok(port);
                }
                Err(e) => {
                    warn!(
                        %attempt,
                        port,
                        elapsed_ms = probe_started.elapsed().as_millis() as u64,
                        "Running worker failed re-validation: {e}"
                    );
                    self.send(SupervisorCommand::MarkUnhealthy { attempt });
                    stale = Some(attempt);
                }
            }
        }

        let (reply, reply_rx) = oneshot::channel();
        if !self.send(SupervisorCommand::Start { stale, reply }) {
            return Err(Arc::new(SupervisorError::shutting_down()));
        }

        reply_rx
            .await
            .unwrap_or_else(|_| Err(Arc::new(SupervisorError::shutting_down())))
    }

    /// Probe the last known port.
    ///
    /// A failed probe moves `Running` to `Unhealthy`; nothing else changes.
    pub async fn check_health(&self) -> Result<u16> {
        let snapshot = self.snapshot();
        let (Some(port), Some(attempt)) = (snapshot.port, snapshot.attempt) else {
            return Err(SupervisorError::not_started());
        };

        let probe_started = Instant::now();
        match self.health.probe(port).await {
            Ok(_) => Ok(port),
            Err(e) => {
                warn!(
                    %attempt,
                    port,
                    elapsed_ms = probe_started.elapsed().as_millis() as u64,
                    "Health check failed: {e}"
                );
                self.send(SupervisorCommand::MarkUnhealthy { attempt });
                Err(e)
            }
        }
    }

    pub async fn health_check(&self) -> bool {
        self.check_health().await.is_ok()
    }

    /// Last known port. Never spawns, never probes, never waits.
    pub fn port(&self) -> Option<u16> {
        self.state_rx.borrow().port
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state_rx.borrow().lifecycle
    }

    pub fn snapshot(&self) -> ServiceSnapshot {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ServiceSnapshot> {
        self.state_rx.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.events_tx.subscribe()
    }

    /// Stop the worker without triggering a restart. A later `start` works.
    pub async fn stop(&self) {
        let (reply, reply_rx) = oneshot::channel();
        if self.send(SupervisorCommand::Stop { reply }) {
            let _ = reply_rx.await;
        }
    }

    /// Stop the worker, remove the port file and end the supervisor task.
    /// Every later `start` fails with `ShuttingDown`.
    pub async fn shutdown(&self) {
        let (reply, reply_rx) = oneshot::channel();
        if self.send(SupervisorCommand::Shutdown { reply }) {
            let _ = reply_rx.await;
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.commands.is_closed()
    }

    pub(crate) fn send(&self, command: SupervisorCommand) -> bool {
        self.commands.send(command).is_ok()
    }
}
