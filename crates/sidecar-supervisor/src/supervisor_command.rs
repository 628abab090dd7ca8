use crate::{AttemptId, Result, SharedResult, WorkerExit};

use tokio::sync::oneshot;

/// Messages processed by the supervisor task, in arrival order.
///
/// Handles send the caller-facing variants; the internal ones come from the
/// per-attempt handshake, exit and restart-timer tasks.
#[derive(Debug)]
pub(crate) enum SupervisorCommand {
    /// Join (or begin) the in-flight start. `stale` is set when the caller
    /// probed that attempt's port and found it dead.
    Start {
        stale: Option<AttemptId>,
        reply: oneshot::Sender<SharedResult<u16>>,
    },
    /// Probe outcomes, tagged with the attempt whose port was probed
    MarkUnhealthy {
        attempt: AttemptId,
    },
    MarkRecovered {
        attempt: AttemptId,
    },
    HandshakeResolved {
        attempt: AttemptId,
        result: Result<u16>,
    },
    WorkerExited(WorkerExit),
    /// Restart delay after the failure of `after` elapsed
    RestartDue {
        after: AttemptId,
    },
    /// A retired attempt outlived the shutdown timeout
    KillOverdue {
        attempt: AttemptId,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}
