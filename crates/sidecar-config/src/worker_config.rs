use crate::{
    ConfigError, ConfigErrorResult, DEFAULT_WORKER_PROGRAM, LaunchLayout, PORT_FILE_ENV,
    WorkerLaunch,
};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Placeholder in `packaged_args` replaced with the packaged resources root.
const ROOT_PLACEHOLDER: &str = "{root}";

/// How to invoke the worker executable.
///
/// The development and packaged layouts differ only in where the program and
/// its script live; the supervisor never sees this distinction, it receives a
/// resolved [`WorkerLaunch`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Executable for the development layout (looked up on PATH if relative)
    pub program: String,
    /// Arguments for the development layout
    pub args: Vec<String>,
    /// Working directory for the worker
    pub working_dir: Option<PathBuf>,
    /// Environment overrides passed to the worker
    pub env: BTreeMap<String, String>,
    /// Which layout to resolve
    pub layout: LaunchLayout,
    /// Bundled resources root for the packaged layout
    pub packaged_root: Option<PathBuf>,
    /// Executable relative to `packaged_root` (falls back to `program`)
    pub packaged_program: Option<String>,
    /// Arguments for the packaged layout; `{root}` expands to `packaged_root`
    pub packaged_args: Vec<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let mut env = BTreeMap::new();
        env.insert(String::from("PYTHONUNBUFFERED"), String::from("1"));

        Self {
            program: String::from(DEFAULT_WORKER_PROGRAM),
            args: Vec::new(),
            working_dir: None,
            env,
            layout: LaunchLayout::default(),
            packaged_root: None,
            packaged_program: None,
            packaged_args: Vec::new(),
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> ConfigErrorResult<()> {
        if self.program.trim().is_empty() {
            return Err(ConfigError::worker("worker.program must not be empty"));
        }

        if self.layout == LaunchLayout::Packaged && self.packaged_root.is_none() {
            return Err(ConfigError::worker(
                "worker.packaged_root is required for the packaged layout",
            ));
        }

        if self.env.contains_key(PORT_FILE_ENV) {
            return Err(ConfigError::worker(format!(
                "worker.env must not set {PORT_FILE_ENV}; it is derived from the handshake settings"
            )));
        }

        Ok(())
    }

    /// Resolve the concrete invocation for the configured layout.
    ///
    /// `port_file` is exported to the worker as `SIDECAR_PORT_FILE`.
    pub fn resolve(&self, port_file: &Path) -> ConfigErrorResult<WorkerLaunch> {
        let mut launch = match self.layout {
            LaunchLayout::Development => WorkerLaunch::new(&self.program)
                .args(self.args.iter().cloned())
                .maybe_working_dir(self.working_dir.clone()),
            LaunchLayout::Packaged => {
                let root = self.packaged_root.as_ref().ok_or_else(|| {
                    ConfigError::worker("worker.packaged_root is required for the packaged layout")
                })?;
                let program = self.packaged_program.as_deref().unwrap_or(&self.program);
                let root_str = root.to_string_lossy();
                let args = if self.packaged_args.is_empty() {
                    &self.args
                } else {
                    &self.packaged_args
                };

                WorkerLaunch::new(root.join(program))
                    .args(args.iter().map(|a| a.replace(ROOT_PLACEHOLDER, &root_str)))
                    .maybe_working_dir(Some(
                        self.working_dir.clone().unwrap_or_else(|| root.clone()),
                    ))
            }
        };

        for (key, value) in &self.env {
            launch = launch.env(key, value);
        }

        Ok(launch.env(PORT_FILE_ENV, port_file.to_string_lossy()))
    }
}
