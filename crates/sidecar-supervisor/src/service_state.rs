use crate::{
    AttemptFailure, AttemptId, Lifecycle, ServiceSnapshot, SharedResult, SupervisorError,
    WorkerProcess,
};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// The single mutable record owned by the supervisor task.
#[derive(Debug, Default)]
pub(crate) struct ServiceState {
    pub lifecycle: Lifecycle,
    /// Set only while `Running` or `Unhealthy`
    pub port: Option<u16>,
    /// Current attempt's process, until its exit is observed
    pub worker: Option<WorkerProcess>,
    pub restart_count: u32,
    /// Callers attached to the in-flight start
    pub waiters: Vec<oneshot::Sender<SharedResult<u16>>>,
    /// Most recently issued attempt
    pub attempt: Option<AttemptId>,
    pub handshake: Option<(AttemptId, JoinHandle<()>)>,
    pub restart_timer: Option<(AttemptId, JoinHandle<()>)>,
    /// Processes asked to stop whose exit has not been observed yet
    pub retiring: HashMap<AttemptId, WorkerProcess>,
    pub last_failure: Option<AttemptFailure>,
    pub running_since: Option<DateTime<Utc>>,
}

impl ServiceState {
    pub fn next_attempt(&mut self) -> AttemptId {
        let attempt = self
            .attempt
            .map(AttemptId::next)
            .unwrap_or_else(AttemptId::first);
        self.attempt = Some(attempt);
        attempt
    }

    pub fn is_current(&self, attempt: AttemptId) -> bool {
        self.attempt == Some(attempt)
    }

    pub fn resolve_waiters(&mut self, result: SharedResult<u16>) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(result.clone());
        }
    }

    pub fn fail_waiters(&mut self, error: SupervisorError) {
        if !self.waiters.is_empty() {
            self.resolve_waiters(Err(Arc::new(error)));
        }
    }

    pub fn cancel_handshake(&mut self) {
        if let Some((_, task)) = self.handshake.take() {
            task.abort();
        }
    }

    pub fn cancel_restart(&mut self) {
        if let Some((_, timer)) = self.restart_timer.take() {
            timer.abort();
        }
    }

    /// Move the current worker to the retiring set and ask it to stop.
    /// Returns the retired attempt, if there was a worker.
    pub fn retire_worker(&mut self) -> Option<AttemptId> {
        let worker = self.worker.take()?;
        let attempt = worker.attempt();
        worker.terminate();
        self.retiring.insert(attempt, worker);
        Some(attempt)
    }

    pub fn snapshot(&self) -> ServiceSnapshot {
        ServiceSnapshot {
            lifecycle: self.lifecycle,
            port: self.port,
            restart_count: self.restart_count,
            pid: self.worker.as_ref().and_then(WorkerProcess::pid),
            attempt: self.attempt,
            last_failure: self.last_failure.clone(),
            running_since: self.running_since,
        }
    }
}
