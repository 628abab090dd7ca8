//! JSON-lines front end around one [`Supervisor`].
//!
//! Requests arrive one per line on the input, responses and supervisor
//! events leave one per line on the output. Requests run concurrently, so a
//! slow `start` never holds up `getPort`.

use crate::cli::RunArgs;
use crate::command_router::CommandRouter;
use crate::commands::{CommandRequest, CommandResponse, ErrorResponse, ResponseLine};
use crate::{HostResult, logging};

use std::future::Future;

use serde::Serialize;
use sidecar_config::SidecarConfig;
use sidecar_supervisor::{Supervisor, SupervisorEvent};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

pub struct Host {
    router: CommandRouter,
}

impl Host {
    pub fn new(supervisor: Supervisor) -> Self {
        Self {
            router: CommandRouter::new(supervisor),
        }
    }

    pub fn supervisor(&self) -> &Supervisor {
        self.router.supervisor()
    }

    /// Serve commands until the input closes or `shutdown` resolves, then shut
    /// the supervisor down and flush every pending response and event.
    pub async fn serve<R, W, S>(&self, input: R, output: W, shutdown: S) -> HostResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
        S: Future<Output = ()>,
    {
        let (lines_tx, lines_rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_lines(output, lines_rx));

        let (stop_events, stop_events_rx) = oneshot::channel();
        let forwarder = tokio::spawn(forward_events(
            self.supervisor().subscribe_events(),
            lines_tx.clone(),
            stop_events_rx,
        ));

        let mut requests = JoinSet::new();
        let mut lines = input.lines();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.accept(&line, &lines_tx, &mut requests),
                    Ok(None) => {
                        info!("Command input closed");
                        break;
                    }
                    Err(e) => {
                        error!("Failed to read command input: {e}");
                        break;
                    }
                },
                Some(joined) = requests.join_next(), if !requests.is_empty() => {
                    if let Err(e) = joined {
                        error!("Command task failed: {e}");
                    }
                }
            }
        }

        self.supervisor().shutdown().await;

        while let Some(joined) = requests.join_next().await {
            if let Err(e) = joined {
                error!("Command task failed: {e}");
            }
        }

        let _ = stop_events.send(());
        if let Err(e) = forwarder.await {
            error!("Event forwarder failed: {e}");
        }

        drop(lines_tx);
        match writer.await {
            Ok(result) => result,
            Err(e) => {
                error!("Output writer failed: {e}");
                Ok(())
            }
        }
    }

    fn accept(
        &self,
        line: &str,
        lines_tx: &mpsc::UnboundedSender<String>,
        requests: &mut JoinSet<()>,
    ) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let request: CommandRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                warn!("Malformed command line: {e}");
                let response = CommandResponse::Error(ErrorResponse::new(format!(
                    "invalid request: {e}"
                )));
                send_line(lines_tx, &ResponseLine::new(None, response));
                return;
            }
        };

        let router = self.router.clone();
        let lines_tx = lines_tx.clone();
        requests.spawn(async move {
            let response = router.dispatch(&request.command).await;
            debug!(
                command = %request.command,
                success = response.is_success(),
                "Command finished"
            );
            send_line(&lines_tx, &ResponseLine::new(request.id, response));
        });
    }
}

/// Entry point of `sidecar-host run`.
pub async fn run(args: RunArgs) -> HostResult<()> {
    let config_dir = match args.config_dir {
        Some(dir) => dir,
        None => SidecarConfig::config_dir()?,
    };

    let config = SidecarConfig::load_from(&config_dir)?;
    config.validate()?;

    logging::setup_logging(&config_dir, &config.logging)?;
    info!("sidecar-host v{} starting", env!("CARGO_PKG_VERSION"));
    info!("Config directory: {}", config_dir.display());
    info!(
        "Logging to {}",
        logging::current_log_path(&config_dir, &config.logging).display()
    );
    config.log_summary();

    let supervisor = Supervisor::from_config(&config)?;
    let shutdown = shutdown_signal()?;

    if args.autostart {
        let supervisor = supervisor.clone();
        tokio::spawn(async move {
            match supervisor.start().await {
                Ok(port) => info!(port, "Worker autostarted"),
                Err(e) => error!("Autostart failed: {e}"),
            }
        });
    }

    let host = Host::new(supervisor);
    host.serve(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        shutdown,
    )
    .await?;

    info!("sidecar-host stopped");
    Ok(())
}

/// Resolves on the first SIGINT or SIGTERM.
#[cfg(unix)]
fn shutdown_signal() -> HostResult<impl Future<Output = ()>> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let (signal_tx, signal_rx) = oneshot::channel();

    std::thread::Builder::new()
        .name(String::from("sidecar-signals"))
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                info!("Received signal {sig}, shutting down...");
                let _ = signal_tx.send(sig);
            }
        })?;

    Ok(async move {
        let _ = signal_rx.await;
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> HostResult<impl Future<Output = ()>> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down..."),
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
        }
    })
}

async fn forward_events(
    mut events: broadcast::Receiver<SupervisorEvent>,
    lines_tx: mpsc::UnboundedSender<String>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            event = events.recv() => match event {
                Ok(event) => send_line(&lines_tx, &event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event forwarder lagged"),
                Err(RecvError::Closed) => break,
            },
            _ = &mut stop => {
                while let Ok(event) = events.try_recv() {
                    send_line(&lines_tx, &event);
                }
                break;
            }
        }
    }
}

async fn write_lines<W>(mut output: W, mut lines_rx: mpsc::UnboundedReceiver<String>) -> HostResult<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = lines_rx.recv().await {
        output.write_all(line.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }
    Ok(())
}

fn send_line<T: Serialize>(lines_tx: &mpsc::UnboundedSender<String>, value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => {
            let _ = lines_tx.send(line);
        }
        Err(e) => error!("Failed to serialize output line: {e}"),
    }
}
