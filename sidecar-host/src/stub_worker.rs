//! Reference worker.
//!
//! Binds a loopback port, publishes it through the handshake file and serves a
//! health endpoint until it is told to stop. `--exit-after-ms` makes it exit
//! on its own with `--exit-code` and leave the port file behind, the way a
//! crashing worker would.

use crate::cli::StubWorkerArgs;
use crate::{HostError, HostResult};

use std::future::IntoFuture;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::get};
use serde_json::json;
use sidecar_config::PORT_FILE_ENV;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

pub const SERVICE_NAME: &str = "sidecar-stub-worker";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Signal,
    Deadline,
}

/// Run the worker until a stop signal or the exit deadline. Returns the
/// process exit code.
pub async fn run(args: StubWorkerArgs) -> HostResult<u8> {
    let port_file = args
        .port_file
        .clone()
        .or_else(|| std::env::var_os(PORT_FILE_ENV).map(PathBuf::from));

    if args.startup_delay_ms > 0 {
        info!("Delaying startup by {}ms", args.startup_delay_ms);
        tokio::time::sleep(Duration::from_millis(args.startup_delay_ms)).await;
    }

    let mut terminate = Terminate::register()?;

    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, args.port)).await?;
    let addr = listener.local_addr()?;
    info!("Stub worker listening on {addr}");

    match &port_file {
        Some(path) => {
            write_port_file(path, addr.port())?;
            info!("Port file written: {}", path.display());
        }
        None => warn!("No port file configured, nobody can discover port {}", addr.port()),
    }

    let server = axum::serve(listener, router()).into_future();
    let exit_after = args.exit_after_ms.map(Duration::from_millis);

    tokio::select! {
        result = server => result?,
        reason = wait_for_stop(&mut terminate, exit_after) => {
            if reason == StopReason::Deadline {
                warn!(exit_code = args.exit_code, "Exit deadline reached, exiting without cleanup");
                return Ok(args.exit_code);
            }
            info!("Shutdown signal received");
        }
    }

    if let Some(path) = &port_file {
        remove_port_file(path);
    }

    info!("Stub worker stopped");
    Ok(0)
}

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/", get(root))
}

async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
        .into_response()
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "service": SERVICE_NAME,
        "endpoints": ["/health"],
    }))
}

/// Write the port atomically (temp file, then rename) so a poller never sees
/// a partial number.
pub fn write_port_file(path: &Path, port: u16) -> HostResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| HostError::port_file(parent, e))?;
    }

    let temp_path = path.with_extension("tmp");
    std::fs::write(&temp_path, port.to_string()).map_err(|e| HostError::port_file(&temp_path, e))?;
    std::fs::rename(&temp_path, path).map_err(|e| HostError::port_file(path, e))?;

    Ok(())
}

fn remove_port_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => info!("Port file removed: {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove port file {}: {e}", path.display()),
    }
}

async fn wait_for_stop(terminate: &mut Terminate, exit_after: Option<Duration>) -> StopReason {
    let deadline = async {
        match exit_after {
            Some(delay) => tokio::time::sleep(delay).await,
            None => std::future::pending().await,
        }
    };

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {e}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = deadline => StopReason::Deadline,
        _ = terminate.recv() => StopReason::Signal,
        _ = ctrl_c => StopReason::Signal,
    }
}

/// SIGTERM listener, registered before the port is published so the
/// supervisor can never signal an unprepared worker.
#[cfg(unix)]
struct Terminate(tokio::signal::unix::Signal);

#[cfg(unix)]
impl Terminate {
    fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        Ok(Self(signal(SignalKind::terminate())?))
    }

    async fn recv(&mut self) {
        self.0.recv().await;
    }
}

#[cfg(not(unix))]
struct Terminate;

#[cfg(not(unix))]
impl Terminate {
    fn register() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) {
        std::future::pending::<()>().await
    }
}
