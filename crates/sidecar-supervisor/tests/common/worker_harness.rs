//! Shell-script workers driven through the real supervisor.

use sidecar_config::{PORT_FILE_ENV, WorkerLaunch};
use sidecar_supervisor::{
    HealthProber, Lifecycle, PortHandshake, RestartPolicy, ServiceSnapshot, Supervisor,
    SupervisorEvent, SupervisorOptions,
};

use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::broadcast;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const WAIT: Duration = Duration::from_secs(10);

/// Publishes `$port` through the handshake file atomically.
const PUBLISH_PORT: &str =
    r#"printf '%s' "$port" > "$SIDECAR_PORT_FILE.tmp" && mv "$SIDECAR_PORT_FILE.tmp" "$SIDECAR_PORT_FILE""#;

/// Worker behaviours, written as `/bin/sh` scripts.
///
/// Every script appends a line to `$SPAWN_LOG` first so tests can count spawns.
pub enum Script {
    /// Publish the healthy port and stay up
    Healthy,
    /// Exit with code 3 before publishing anything
    CrashOnStart,
    /// Never publish a port
    Silent,
    /// First spawn publishes, runs briefly, then exits 1; later spawns stay up
    CrashOnceAfterRunning,
    /// First spawn publishes a dead port; later spawns publish the healthy one
    DeadPortFirst,
    /// Exit 3 until `$HEAL_FLAG` exists, then behave like `Healthy`
    CrashUntilHealed,
    /// Write `$$` to `$PID_FILE`, never publish, ignore SIGTERM
    IgnoreTerminate,
    /// Publish the healthy port; on SIGTERM exit 1 instead of dying by signal
    ExitOneOnTerminate,
    /// Publish the healthy port, then exit 1 after 300 ms, every spawn
    ExitSoonAfterRunning,
}

impl Script {
    fn body(&self) -> String {
        let stay_up = format!("port=$HEALTH_PORT; {PUBLISH_PORT}; exec sleep 30");
        match self {
            Script::Healthy => stay_up,
            Script::CrashOnStart => String::from("exit 3"),
            Script::Silent => String::from("exec sleep 30"),
            Script::CrashOnceAfterRunning => format!(
                r#"if [ "$(wc -l < "$SPAWN_LOG")" -eq 1 ]; then port=$HEALTH_PORT; {PUBLISH_PORT}; sleep 0.3; exit 1; fi; {stay_up}"#
            ),
            Script::DeadPortFirst => format!(
                r#"if [ "$(wc -l < "$SPAWN_LOG")" -eq 1 ]; then port=$DEAD_PORT; else port=$HEALTH_PORT; fi; {PUBLISH_PORT}; exec sleep 30"#
            ),
            Script::CrashUntilHealed => {
                format!(r#"if [ ! -f "$HEAL_FLAG" ]; then exit 3; fi; {stay_up}"#)
            }
            Script::IgnoreTerminate => String::from(
                r#"echo $$ > "$PID_FILE"; trap '' TERM; while true; do sleep 0.1; done"#,
            ),
            Script::ExitOneOnTerminate => format!(
                r#"trap 'exit 1' TERM; port=$HEALTH_PORT; {PUBLISH_PORT}; while true; do sleep 0.1; done"#
            ),
            Script::ExitSoonAfterRunning => {
                format!("port=$HEALTH_PORT; {PUBLISH_PORT}; sleep 0.3; exit 1")
            }
        }
    }
}

pub struct WorkerHarness {
    pub dir: TempDir,
    pub health: MockServer,
    pub dead_port: u16,
    pub max_restarts: u32,
    pub restart_delay: Duration,
    pub startup_timeout: Duration,
}

impl WorkerHarness {
    pub async fn new() -> Self {
        let health = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&health)
            .await;

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let dead_port = listener.local_addr().unwrap().port();
        drop(listener);

        Self {
            dir: TempDir::new().unwrap(),
            health,
            dead_port,
            max_restarts: 3,
            restart_delay: Duration::from_millis(20),
            startup_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_max_restarts(mut self, max_restarts: u32) -> Self {
        self.max_restarts = max_restarts;
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn health_port(&self) -> u16 {
        self.health.address().port()
    }

    pub fn port_file(&self) -> PathBuf {
        self.dir.path().join("worker-port.txt")
    }

    pub fn spawn_log(&self) -> PathBuf {
        self.dir.path().join("spawns.log")
    }

    pub fn heal_flag(&self) -> PathBuf {
        self.dir.path().join("healed")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.dir.path().join("worker.pid")
    }

    pub fn spawn_count(&self) -> usize {
        std::fs::read_to_string(self.spawn_log())
            .map(|log| log.lines().count())
            .unwrap_or(0)
    }

    pub fn launch(&self, script: Script) -> WorkerLaunch {
        let body = format!(r#"echo spawned >> "$SPAWN_LOG"; {}"#, script.body());
        WorkerLaunch::new("/bin/sh")
            .arg("-c")
            .arg(body)
            .env("SPAWN_LOG", self.spawn_log().to_string_lossy())
            .env("HEAL_FLAG", self.heal_flag().to_string_lossy())
            .env("PID_FILE", self.pid_file().to_string_lossy())
            .env("HEALTH_PORT", self.health_port().to_string())
            .env("DEAD_PORT", self.dead_port.to_string())
            .env(PORT_FILE_ENV, self.port_file().to_string_lossy())
    }

    pub fn options(&self, launch: WorkerLaunch) -> SupervisorOptions {
        SupervisorOptions::new(
            launch,
            PortHandshake::new(
                self.port_file(),
                Duration::from_millis(20),
                self.startup_timeout,
            ),
            HealthProber::new("/health", Duration::from_millis(500)).unwrap(),
            RestartPolicy::new(self.max_restarts, self.restart_delay),
        )
        .with_shutdown_timeout(Duration::from_secs(2))
    }

    pub fn supervisor(&self, script: Script) -> Supervisor {
        Supervisor::new(self.options(self.launch(script)))
    }
}

/// Wait until the published snapshot satisfies `predicate`.
pub async fn wait_for_state<F>(supervisor: &Supervisor, predicate: F) -> ServiceSnapshot
where
    F: Fn(&ServiceSnapshot) -> bool,
{
    let mut state = supervisor.subscribe_state();
    let result = tokio::time::timeout(WAIT, async {
        state.wait_for(|s| predicate(s)).await.map(|s| (*s).clone())
    })
    .await;

    match result {
        Ok(Ok(snapshot)) => snapshot,
        _ => panic!("state never matched; last: {:?}", supervisor.snapshot()),
    }
}

pub async fn wait_for_lifecycle(supervisor: &Supervisor, lifecycle: Lifecycle) -> ServiceSnapshot {
    wait_for_state(supervisor, |s| s.lifecycle == lifecycle).await
}

/// Whether a process with this pid still exists (zombies included).
pub fn process_exists(pid: i32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
}

/// Events received so far, without waiting.
pub fn drain_events(events: &mut broadcast::Receiver<SupervisorEvent>) -> Vec<SupervisorEvent> {
    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    received
}
