//! The supervisor task: sole owner and mutator of [`ServiceState`].

use crate::service_state::ServiceState;
use crate::supervisor_command::SupervisorCommand;
use crate::{
    AttemptFailure, AttemptId, Lifecycle, PortHandshake, RestartDecision, RestartPolicy,
    ServiceSnapshot, SharedResult, SupervisorError, SupervisorEvent, SupervisorOptions,
    WorkerExit, WorkerProcess,
};

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sidecar_config::WorkerLaunch;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, error, info, warn};

/// How long to wait for exit events after a force kill.
const KILL_GRACE: Duration = Duration::from_secs(2);

pub(crate) struct SupervisorActor {
    launch: WorkerLaunch,
    handshake: PortHandshake,
    policy: RestartPolicy,
    shutdown_timeout: Duration,
    state: ServiceState,
    attempt_started: Option<Instant>,
    mailbox: mpsc::UnboundedReceiver<SupervisorCommand>,
    /// Weak so the mailbox closes once every handle is gone
    mailbox_tx: mpsc::WeakUnboundedSender<SupervisorCommand>,
    /// Commands that arrived while a stop was draining exits
    deferred: VecDeque<SupervisorCommand>,
    state_tx: watch::Sender<ServiceSnapshot>,
    events_tx: broadcast::Sender<SupervisorEvent>,
}

impl SupervisorActor {
    pub(crate) fn new(
        options: SupervisorOptions,
        mailbox: mpsc::UnboundedReceiver<SupervisorCommand>,
        mailbox_tx: mpsc::WeakUnboundedSender<SupervisorCommand>,
        state_tx: watch::Sender<ServiceSnapshot>,
        events_tx: broadcast::Sender<SupervisorEvent>,
    ) -> Self {
        Self {
            launch: options.launch,
            handshake: options.handshake,
            policy: options.restart,
            shutdown_timeout: options.shutdown_timeout,
            state: ServiceState::default(),
            attempt_started: None,
            mailbox,
            mailbox_tx,
            deferred: VecDeque::new(),
            state_tx,
            events_tx,
        }
    }

    pub(crate) async fn run(mut self) {
        info!(
            command = %self.launch.display_command(),
            max_restarts = self.policy.max_restarts(),
            "Supervisor ready"
        );

        loop {
            let command = match self.deferred.pop_front() {
                Some(command) => command,
                None => match self.mailbox.recv().await {
                    Some(command) => command,
                    None => {
                        info!("All supervisor handles dropped, stopping worker");
                        self.shutdown().await;
                        break;
                    }
                },
            };

            if !self.handle(command).await {
                break;
            }
        }

        debug!("Supervisor task exited");
    }

    /// Returns `false` once the supervisor has shut down.
    async fn handle(&mut self, command: SupervisorCommand) -> bool {
        match command {
            SupervisorCommand::Start { stale, reply } => self.handle_start(stale, reply).await,
            SupervisorCommand::MarkUnhealthy { attempt } => self.handle_unhealthy(attempt),
            SupervisorCommand::MarkRecovered { attempt } => self.handle_recovered(attempt),
            SupervisorCommand::HandshakeResolved { attempt, result } => {
                self.handle_handshake(attempt, result)
            }
            SupervisorCommand::WorkerExited(exit) => self.handle_exit(exit),
            SupervisorCommand::RestartDue { after } => self.handle_restart_due(after).await,
            SupervisorCommand::KillOverdue { attempt } => self.handle_kill_overdue(attempt),
            SupervisorCommand::Stop { reply } => {
                self.stop().await;
                let _ = reply.send(());
            }
            SupervisorCommand::Shutdown { reply } => {
                self.shutdown().await;
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    async fn handle_start(
        &mut self,
        stale: Option<AttemptId>,
        reply: oneshot::Sender<SharedResult<u16>>,
    ) {
        match self.state.lifecycle {
            Lifecycle::Running | Lifecycle::Unhealthy => {
                if let Some(attempt) = stale
                    && self.state.is_current(attempt)
                {
                    warn!(
                        %attempt,
                        port = ?self.state.port,
                        "Discarding unresponsive worker and respawning"
                    );
                    self.retire_current();
                    self.state.port = None;
                    self.state.running_since = None;
                    self.state.waiters.push(reply);
                    self.begin_attempt().await;
                } else if let Some(port) = self.state.port {
                    let _ = reply.send(Ok(port));
                }
            }
            Lifecycle::Starting => {
                debug!(waiters = self.state.waiters.len() + 1, "Joining in-flight start");
                self.state.waiters.push(reply);
            }
            Lifecycle::Idle => {
                self.state.waiters.push(reply);
                self.begin_attempt().await;
            }
            Lifecycle::Failed => {
                info!(
                    previous_failures = self.state.restart_count,
                    "Manual start after crash loop, resetting restart count"
                );
                self.state.restart_count = 0;
                self.state.last_failure = None;
                self.state.waiters.push(reply);
                self.begin_attempt().await;
            }
        }
    }

    async fn begin_attempt(&mut self) {
        let attempt = self.state.next_attempt();
        self.state.lifecycle = Lifecycle::Starting;

        if let Err(e) = self.handshake.clear().await {
            warn!(%attempt, "Could not remove stale port file: {e}");
        }

        match WorkerProcess::spawn(&self.launch, attempt) {
            Ok((worker, exit_rx)) => {
                info!(
                    %attempt,
                    pid = ?worker.pid(),
                    restart_count = self.state.restart_count,
                    "Spawned worker"
                );
                self.emit(SupervisorEvent::Spawned {
                    attempt,
                    pid: worker.pid(),
                });
                self.forward_exit(exit_rx);
                self.state.worker = Some(worker);
                self.attempt_started = Some(Instant::now());
                self.start_handshake(attempt);
                self.publish();
            }
            Err(e) => {
                error!(%attempt, restart_count = self.state.restart_count, "{e}");
                let message = match &e {
                    SupervisorError::SpawnFailure { source, .. } => source.to_string(),
                    other => other.to_string(),
                };
                self.attempt_failed(attempt, AttemptFailure::SpawnFailed { message });
            }
        }
    }

    fn forward_exit(&self, exit_rx: oneshot::Receiver<WorkerExit>) {
        let mailbox = self.mailbox_tx.clone();
        tokio::spawn(async move {
            if let Ok(exit) = exit_rx.await
                && let Some(tx) = mailbox.upgrade()
            {
                let _ = tx.send(SupervisorCommand::WorkerExited(exit));
            }
        });
    }

    fn start_handshake(&mut self, attempt: AttemptId) {
        let handshake = self.handshake.clone();
        let mailbox = self.mailbox_tx.clone();
        let task = tokio::spawn(async move {
            let result = handshake.wait_for_port().await;
            if let Some(tx) = mailbox.upgrade() {
                let _ = tx.send(SupervisorCommand::HandshakeResolved { attempt, result });
            }
        });
        self.state.handshake = Some((attempt, task));
    }

    fn handle_handshake(&mut self, attempt: AttemptId, result: crate::Result<u16>) {
        let live = matches!(self.state.handshake, Some((current, _)) if current == attempt);
        if !live || self.state.lifecycle != Lifecycle::Starting {
            debug!(%attempt, "Ignoring handshake result from superseded attempt");
            return;
        }
        self.state.handshake = None;
        let elapsed_ms = self.elapsed_ms();

        match result {
            Ok(port) => {
                info!(%attempt, port, elapsed_ms, "Worker running");
                self.state.lifecycle = Lifecycle::Running;
                self.state.port = Some(port);
                self.state.restart_count = 0;
                self.state.last_failure = None;
                self.state.running_since = Some(Utc::now());
                self.emit(SupervisorEvent::Started {
                    attempt,
                    port,
                    elapsed_ms,
                });
                self.state.resolve_waiters(Ok(port));
                self.publish();
            }
            Err(e) => {
                warn!(%attempt, elapsed_ms, "{e}");
                self.retire_current();
                self.attempt_failed(
                    attempt,
                    AttemptFailure::StartupTimeout {
                        timeout_ms: self.handshake.timeout().as_millis() as u64,
                    },
                );
            }
        }
    }

    fn handle_exit(&mut self, exit: WorkerExit) {
        if let Some(worker) = self.state.retiring.remove(&exit.attempt) {
            info!(
                attempt = %exit.attempt,
                uptime_ms = worker.uptime().as_millis() as u64,
                "Retired worker exited ({})",
                exit.describe()
            );
            return;
        }

        let is_live = self
            .state
            .worker
            .as_ref()
            .is_some_and(|w| w.attempt() == exit.attempt);
        if !is_live || !self.state.is_current(exit.attempt) {
            debug!(attempt = %exit.attempt, "Ignoring exit of superseded worker");
            return;
        }

        let uptime_ms = self
            .state
            .worker
            .take()
            .map(|w| w.uptime().as_millis() as u64)
            .unwrap_or_default();

        match self.state.lifecycle {
            Lifecycle::Starting => {
                self.state.cancel_handshake();
                warn!(
                    attempt = %exit.attempt,
                    elapsed_ms = self.elapsed_ms(),
                    "Worker exited during startup ({})",
                    exit.describe()
                );
                self.attempt_failed(
                    exit.attempt,
                    AttemptFailure::ExitedDuringStartup {
                        code: exit.code,
                        signal: exit.signal,
                    },
                );
            }
            Lifecycle::Running | Lifecycle::Unhealthy => {
                error!(
                    attempt = %exit.attempt,
                    uptime_ms,
                    port = ?self.state.port,
                    "Worker crashed ({})",
                    exit.describe()
                );
                self.state.running_since = None;
                self.attempt_failed(
                    exit.attempt,
                    AttemptFailure::Crashed {
                        code: exit.code,
                        signal: exit.signal,
                    },
                );
            }
            Lifecycle::Idle | Lifecycle::Failed => {
                debug!(attempt = %exit.attempt, "Worker exit with no active lifecycle");
                self.publish();
            }
        }
    }

    /// Feed a failed attempt into the restart policy.
    fn attempt_failed(&mut self, attempt: AttemptId, failure: AttemptFailure) {
        self.state.restart_count += 1;
        self.state.port = None;
        self.state.last_failure = Some(failure.clone());
        let restart_count = self.state.restart_count;

        self.emit(SupervisorEvent::AttemptFailed {
            attempt,
            failure: failure.clone(),
            restart_count,
        });

        match self.policy.decide(restart_count) {
            RestartDecision::Retry { delay } => {
                warn!(
                    %attempt,
                    restart_count,
                    max_restarts = self.policy.max_restarts(),
                    delay_ms = delay.as_millis() as u64,
                    "Attempt failed ({failure}), scheduling restart"
                );
                self.state.lifecycle = Lifecycle::Starting;
                self.emit(SupervisorEvent::Restarting {
                    restart_count,
                    delay_ms: delay.as_millis() as u64,
                });
                self.schedule_restart(attempt, delay);
            }
            RestartDecision::GiveUp => {
                error!(
                    %attempt,
                    restart_count,
                    max_restarts = self.policy.max_restarts(),
                    "Restart limit exceeded ({failure}), worker marked failed"
                );
                self.state.lifecycle = Lifecycle::Failed;
                self.emit(SupervisorEvent::CrashLoopExceeded {
                    attempts: restart_count,
                    last_failure: failure.clone(),
                });
                self.state
                    .fail_waiters(SupervisorError::crash_loop(restart_count, failure));
            }
        }

        self.publish();
    }

    fn schedule_restart(&mut self, after: AttemptId, delay: Duration) {
        self.state.cancel_restart();
        let mailbox = self.mailbox_tx.clone();
        let timer = tokio::spawn(async move {
            sleep(delay).await;
            if let Some(tx) = mailbox.upgrade() {
                let _ = tx.send(SupervisorCommand::RestartDue { after });
            }
        });
        self.state.restart_timer = Some((after, timer));
    }

    async fn handle_restart_due(&mut self, after: AttemptId) {
        let due = matches!(self.state.restart_timer, Some((pending, _)) if pending == after);
        if !due || self.state.lifecycle != Lifecycle::Starting {
            debug!(%after, "Ignoring cancelled restart");
            return;
        }
        self.state.restart_timer = None;
        self.begin_attempt().await;
    }

    /// Retire the current worker and force it down if it is still around
    /// after the shutdown timeout.
    fn retire_current(&mut self) {
        let Some(attempt) = self.state.retire_worker() else {
            return;
        };
        let grace = self.shutdown_timeout;
        let mailbox = self.mailbox_tx.clone();
        tokio::spawn(async move {
            sleep(grace).await;
            if let Some(tx) = mailbox.upgrade() {
                let _ = tx.send(SupervisorCommand::KillOverdue { attempt });
            }
        });
    }

    fn handle_kill_overdue(&mut self, attempt: AttemptId) {
        if let Some(worker) = self.state.retiring.get(&attempt) {
            warn!(
                %attempt,
                pid = ?worker.pid(),
                timeout_ms = self.shutdown_timeout.as_millis() as u64,
                "Retired worker ignored terminate, killing"
            );
            worker.kill();
        }
    }

    fn handle_unhealthy(&mut self, attempt: AttemptId) {
        if self.state.lifecycle != Lifecycle::Running || !self.state.is_current(attempt) {
            debug!(%attempt, "Ignoring health failure of superseded attempt");
            return;
        }
        if let Some(port) = self.state.port {
            warn!(%attempt, port, "Worker failed health check, marked unhealthy");
            self.state.lifecycle = Lifecycle::Unhealthy;
            self.emit(SupervisorEvent::Unhealthy { port });
            self.publish();
        }
    }

    fn handle_recovered(&mut self, attempt: AttemptId) {
        if self.state.lifecycle != Lifecycle::Unhealthy || !self.state.is_current(attempt) {
            return;
        }
        if let Some(port) = self.state.port {
            info!(%attempt, port, "Worker healthy again");
            self.state.lifecycle = Lifecycle::Running;
            self.emit(SupervisorEvent::Recovered { port });
            self.publish();
        }
    }

    /// Intentional, non-terminal stop. Never counts as a failure.
    async fn stop(&mut self) {
        let was_active = self.halt().await;
        self.state.fail_waiters(SupervisorError::stopped());
        if was_active {
            info!("Worker stopped");
            self.emit(SupervisorEvent::Stopped);
        }
        self.publish();
    }

    async fn shutdown(&mut self) {
        info!("Shutting down supervisor");
        let was_active = self.halt().await;
        self.state.fail_waiters(SupervisorError::shutting_down());

        if let Err(e) = self.handshake.clear().await {
            warn!("Could not remove port file on shutdown: {e}");
        }
        if was_active {
            self.emit(SupervisorEvent::Stopped);
        }
        self.publish();

        self.mailbox.close();
        let mut pending: Vec<SupervisorCommand> = self.deferred.drain(..).collect();
        while let Ok(command) = self.mailbox.try_recv() {
            pending.push(command);
        }
        for command in pending {
            match command {
                SupervisorCommand::Start { reply, .. } => {
                    let _ = reply.send(Err(Arc::new(SupervisorError::shutting_down())));
                }
                SupervisorCommand::Stop { reply } | SupervisorCommand::Shutdown { reply } => {
                    let _ = reply.send(());
                }
                _ => {}
            }
        }
    }

    /// Cancel pending work and stop every process. `Failed` stays `Failed`
    /// so a stop never hands back a fresh restart budget; anything else
    /// returns to `Idle`. Returns whether a worker or restart was pending.
    async fn halt(&mut self) -> bool {
        let was_active = self.state.worker.is_some() || self.state.restart_timer.is_some();

        self.state.cancel_handshake();
        self.state.cancel_restart();
        self.state.retire_worker();
        if self.state.lifecycle != Lifecycle::Failed {
            self.state.lifecycle = Lifecycle::Idle;
        }
        self.state.port = None;
        self.state.running_since = None;
        self.publish();

        if self.state.retiring.is_empty() {
            return was_active;
        }

        let deadline = Instant::now() + self.shutdown_timeout;
        if !self.drain_exits(deadline).await {
            warn!(
                remaining = self.state.retiring.len(),
                timeout_ms = self.shutdown_timeout.as_millis() as u64,
                "Worker did not exit in time, killing"
            );
            for worker in self.state.retiring.values() {
                worker.kill();
            }
            if !self.drain_exits(Instant::now() + KILL_GRACE).await {
                error!(
                    remaining = self.state.retiring.len(),
                    "Worker exit not observed after kill"
                );
                self.state.retiring.clear();
            }
        }

        was_active
    }

    /// Wait for every retiring process to exit, deferring unrelated commands.
    async fn drain_exits(&mut self, deadline: Instant) -> bool {
        while !self.state.retiring.is_empty() {
            match timeout_at(deadline, self.mailbox.recv()).await {
                Ok(Some(SupervisorCommand::WorkerExited(exit))) => {
                    if self.state.retiring.remove(&exit.attempt).is_some() {
                        info!(
                            attempt = %exit.attempt,
                            requested = exit.requested,
                            "Worker exited ({})",
                            exit.describe()
                        );
                    }
                }
                Ok(Some(command)) => self.deferred.push_back(command),
                Ok(None) | Err(_) => return false,
            }
        }
        true
    }

    fn elapsed_ms(&self) -> u64 {
        self.attempt_started
            .map(|started| started.elapsed().as_millis() as u64)
            .unwrap_or_default()
    }

    fn emit(&self, event: SupervisorEvent) {
        let _ = self.events_tx.send(event);
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.snapshot());
    }
}
