
use sidecar_config::WorkerLaunch;
use sidecar_supervisor::{
    HealthProber, PortHandshake, RestartPolicy, Supervisor, SupervisorOptions,
};

use std::time::Duration;

use tempfile::TempDir;

/// Supervisor whose worker can never be spawned, with no restart budget.
/// Good for everything that must not touch a real process.
pub(crate) fn unspawnable_supervisor(dir: &TempDir) -> Supervisor {
    let launch = WorkerLaunch::new(dir.path().join("no-such-worker"));
    let handshake = PortHandshake::new(
        dir.path().join("worker-port.txt"),
        Duration::from_millis(20),
        Duration::from_millis(500),
    );
    let health = HealthProber::new("/health", Duration::from_millis(200)).unwrap();
    let restart = RestartPolicy::new(0, Duration::from_millis(10));

    Supervisor::new(
        SupervisorOptions::new(launch, handshake, health, restart)
            .with_shutdown_timeout(Duration::from_millis(500)),
    )
}
