//! Spawned worker process with a single exit notification.

use crate::{AttemptId, Result, SupervisorError};

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use sidecar_config::WorkerLaunch;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

const WORKER_LOG_TARGET: &str = "sidecar::worker";

/// Terminal event of one spawned process. Sent exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerExit {
    pub attempt: AttemptId,
    pub code: Option<i32>,
    pub signal: Option<i32>,
    /// The supervisor asked the process to stop
    pub requested: bool,
}

impl WorkerExit {
    fn from_status(attempt: AttemptId, status: ExitStatus, requested: bool) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            attempt,
            code: status.code(),
            signal,
            requested,
        }
    }

    pub fn describe(&self) -> String {
        crate::attempt_failure::describe_exit(self.code, self.signal)
    }
}

#[derive(Debug, Clone, Copy)]
enum Control {
    Terminate,
    Kill,
}

#[derive(Debug, Clone, Copy)]
enum OutputStream {
    Stdout,
    Stderr,
}

/// Handle to a running worker.
///
/// The `Child` itself lives in a waiter task that reports the exit; this
/// handle only signals it. Dropping the handle kills the process.
#[derive(Debug)]
pub struct WorkerProcess {
    attempt: AttemptId,
    pid: Option<u32>,
    started_at: Instant,
    requested: Arc<AtomicBool>,
    control_tx: mpsc::UnboundedSender<Control>,
}

impl WorkerProcess {
    /// Spawn the worker and start forwarding its output.
    ///
    /// The returned receiver resolves once, when the process ends.
    pub fn spawn(
        launch: &WorkerLaunch,
        attempt: AttemptId,
    ) -> Result<(Self, oneshot::Receiver<WorkerExit>)> {
        let mut command = Command::new(&launch.program);
        command
            .args(&launch.args)
            .envs(&launch.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &launch.working_dir {
            command.current_dir(dir);
        }

        // Own process group so terminate reaches the worker's children too
        #[cfg(unix)]
        unsafe {
            command.pre_exec(|| {
                let _ = libc::setpgid(0, 0);
                Ok(())
            });
        }

        let mut child = command.spawn().map_err(|e| {
            SupervisorError::spawn_failure(launch.program.display().to_string(), e)
        })?;
        let pid = child.id();

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, attempt, OutputStream::Stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, attempt, OutputStream::Stderr));
        }

        let requested = Arc::new(AtomicBool::new(false));
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = oneshot::channel();

        tokio::spawn(wait_for_exit(
            child,
            attempt,
            requested.clone(),
            control_rx,
            exit_tx,
        ));

        Ok((
            Self {
                attempt,
                pid,
                started_at: Instant::now(),
                requested,
                control_tx,
            },
            exit_rx,
        ))
    }

    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Ask the worker to stop (SIGTERM to its process group on Unix).
    pub fn terminate(&self) {
        self.requested.store(true, Ordering::SeqCst);
        let _ = self.control_tx.send(Control::Terminate);
    }

    /// Force the worker down.
    pub fn kill(&self) {
        self.requested.store(true, Ordering::SeqCst);
        let _ = self.control_tx.send(Control::Kill);
    }
}

async fn wait_for_exit(
    mut child: Child,
    attempt: AttemptId,
    requested: Arc<AtomicBool>,
    mut control_rx: mpsc::UnboundedReceiver<Control>,
    exit_tx: oneshot::Sender<WorkerExit>,
) {
    let pid = child.id();
    let mut handle_dropped = false;

    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            control = control_rx.recv(), if !handle_dropped => match control {
                Some(Control::Terminate) => signal_worker(&mut child, pid, Control::Terminate),
                Some(Control::Kill) => signal_worker(&mut child, pid, Control::Kill),
                None => {
                    handle_dropped = true;
                    signal_worker(&mut child, pid, Control::Kill);
                }
            },
        }
    };

    let requested = requested.load(Ordering::SeqCst);
    let exit = match status {
        Ok(status) => WorkerExit::from_status(attempt, status, requested),
        Err(e) => {
            error!(%attempt, "Failed to wait for worker: {e}");
            WorkerExit {
                attempt,
                code: None,
                signal: None,
                requested,
            }
        }
    };

    let _ = exit_tx.send(exit);
}

#[cfg(unix)]
fn signal_worker(child: &mut Child, pid: Option<u32>, control: Control) {
    use nix::sys::signal::{Signal, kill, killpg};
    use nix::unistd::Pid;

    let Some(pid) = pid else {
        return;
    };
    let signal = match control {
        Control::Terminate => Signal::SIGTERM,
        Control::Kill => Signal::SIGKILL,
    };
    let target = Pid::from_raw(pid as i32);

    if let Err(e) = killpg(target, signal).or_else(|_| kill(target, signal)) {
        warn!(pid, "Failed to send {signal} to worker: {e}");
        if matches!(control, Control::Kill) {
            let _ = child.start_kill();
        }
    }
}

#[cfg(not(unix))]
fn signal_worker(child: &mut Child, pid: Option<u32>, _control: Control) {
    if let Err(e) = child.start_kill() {
        warn!(?pid, "Failed to stop worker: {e}");
    }
}

/// Log every line the worker writes. Lines that are not UTF-8 are logged
/// lossily and the pipe keeps draining until EOF, so the worker never sees
/// a closed pipe while it is alive.
async fn forward_output<R>(reader: R, attempt: AttemptId, stream: OutputStream)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                match stream {
                    OutputStream::Stdout => info!(target: WORKER_LOG_TARGET, %attempt, "{line}"),
                    OutputStream::Stderr => warn!(target: WORKER_LOG_TARGET, %attempt, "{line}"),
                }
            }
            Err(e) => {
                warn!(%attempt, ?stream, "Failed to read worker output: {e}");
                break;
            }
        }
    }
}
