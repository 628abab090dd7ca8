//! The real `sidecar-host` binary, driven over its stdin/stdout.

use sidecar_config::SidecarConfig;

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

pub const WAIT: Duration = Duration::from_secs(10);
pub const PORT_FILE_NAME: &str = "worker-port.txt";

pub fn host_binary() -> &'static str {
    env!("CARGO_BIN_EXE_sidecar-host")
}

/// Config directory whose worker is this crate's own `stub-worker`.
pub struct HostConfig {
    pub dir: TempDir,
    pub config: SidecarConfig,
}

impl HostConfig {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = SidecarConfig::default();

        config.worker.program = host_binary().to_string();
        config.worker.args = vec![String::from("stub-worker")];
        config.handshake.directory = Some(dir.path().to_path_buf());
        config.handshake.port_file_name = String::from(PORT_FILE_NAME);
        config.handshake.poll_interval_ms = 20;
        config.handshake.startup_timeout_ms = 5000;
        config.health.timeout_ms = 1000;
        config.resilience.max_restarts = 2;
        config.resilience.restart_delay_ms = 50;
        config.resilience.shutdown_timeout_ms = 2000;

        Self { dir, config }
    }

    pub fn with_worker_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config
            .worker
            .args
            .extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_max_restarts(mut self, max_restarts: u32) -> Self {
        self.config.resilience.max_restarts = max_restarts;
        self
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn port_file(&self) -> PathBuf {
        self.dir.path().join(PORT_FILE_NAME)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.dir.path().join(&self.config.logging.dir)
    }

    pub fn save(&self) {
        self.config.save(self.dir.path()).unwrap();
    }
}

pub struct HostProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    /// Lines read while looking for something else
    backlog: Vec<Value>,
}

impl HostProcess {
    pub async fn spawn(config: &HostConfig) -> Self {
        config.save();

        let mut child = Command::new(host_binary())
            .arg("run")
            .arg("--config-dir")
            .arg(config.path())
            .env("RUST_LOG", "debug")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .unwrap();

        let stdin = child.stdin.take();
        let stdout = BufReader::new(child.stdout.take().unwrap()).lines();

        Self {
            child,
            stdin,
            stdout,
            backlog: Vec::new(),
        }
    }

    pub fn pid(&self) -> u32 {
        self.child.id().unwrap()
    }

    /// Send one command and wait for the response carrying the same id.
    pub async fn request(&mut self, id: u64, command: &str) -> Value {
        self.send(id, command).await;
        self.response(id).await
    }

    pub async fn send(&mut self, id: u64, command: &str) {
        let line = json!({ "id": id, "command": command }).to_string();
        let stdin = self.stdin.as_mut().unwrap();
        stdin.write_all(line.as_bytes()).await.unwrap();
        stdin.write_all(b"\n").await.unwrap();
        stdin.flush().await.unwrap();
    }

    pub async fn response(&mut self, id: u64) -> Value {
        let id = json!(id);
        self.next_matching(|line| line.get("id") == Some(&id)).await
    }

    /// Wait for an event line by name, skipping everything else.
    pub async fn event(&mut self, name: &str) -> Value {
        self.next_matching(|line| line.get("event").and_then(Value::as_str) == Some(name))
            .await
    }

    pub fn seen_events(&self) -> Vec<String> {
        self.backlog
            .iter()
            .filter_map(|line| line.get("event").and_then(Value::as_str))
            .map(String::from)
            .collect()
    }

    async fn next_matching(&mut self, matches: impl Fn(&Value) -> bool) -> Value {
        if let Some(index) = self.backlog.iter().position(&matches) {
            return self.backlog.remove(index);
        }

        loop {
            let line = tokio::time::timeout(WAIT, self.stdout.next_line())
                .await
                .expect("timed out waiting for host output")
                .unwrap()
                .expect("host closed stdout");
            let value: Value = serde_json::from_str(&line).unwrap();

            if matches(&value) {
                return value;
            }
            self.backlog.push(value);
        }
    }

    /// Close stdin and wait for the host to exit on its own.
    pub async fn close(mut self) -> ExitStatus {
        drop(self.stdin.take());
        self.wait().await
    }

    pub async fn wait(&mut self) -> ExitStatus {
        tokio::time::timeout(WAIT, self.child.wait())
            .await
            .expect("host did not exit")
            .unwrap()
    }
}

/// Poll the handshake file until it holds a port.
pub async fn read_port_file(path: &Path) -> u16 {
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        if let Ok(text) = tokio::fs::read_to_string(path).await
            && let Ok(port) = text.trim().parse()
        {
            return port;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "no port in {}",
            path.display()
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[cfg(unix)]
pub fn send_sigterm(pid: u32) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), Signal::SIGTERM).unwrap();
}
