//! Supervisor configuration with validation and versioning.

use crate::{
    CONFIG_DIR_ENV, CONFIG_FILENAME, ConfigError, ConfigErrorResult, DEFAULT_CONFIG_DIR,
    HandshakeConfig, HealthConfig, LoggingConfig, ResilienceConfig, WorkerConfig, WorkerLaunch,
};

use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

/// Configuration version for migration support.
/// Increment when adding new fields or changing structure.
pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SidecarConfig {
    /// Config file format version
    pub version: u32,
    pub worker: WorkerConfig,
    pub handshake: HandshakeConfig,
    pub health: HealthConfig,
    pub resilience: ResilienceConfig,
    pub logging: LoggingConfig,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            worker: WorkerConfig::default(),
            handshake: HandshakeConfig::default(),
            health: HealthConfig::default(),
            resilience: ResilienceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SidecarConfig {
    /// Load config from the default config directory.
    ///
    /// Loading order:
    /// 1. SIDECAR_CONFIG_DIR env var, else ./.sidecar/
    /// 2. config.toml if it exists, else defaults
    /// 3. SIDECAR_* environment variable overrides
    ///
    /// Does NOT validate - call validate() after load().
    pub fn load() -> ConfigErrorResult<Self> {
        Self::load_from(&Self::config_dir()?)
    }

    /// Load config from an explicit directory, applying env overrides.
    pub fn load_from(config_dir: &Path) -> ConfigErrorResult<Self> {
        let config_path = config_dir.join(CONFIG_FILENAME);

        let mut config = if config_path.exists() {
            Self::load_toml(&config_path)?
        } else {
            SidecarConfig::default()
        };

        if config.version < CONFIG_VERSION {
            config = Self::migrate(config);
        }

        config.apply_env_overrides();

        Ok(config)
    }

    fn load_toml(path: &Path) -> ConfigErrorResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::Toml {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Save config atomically (write temp file, then rename).
    pub fn save(&self, config_dir: &Path) -> ConfigErrorResult<PathBuf> {
        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::Io {
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILENAME);
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::TomlSerialize { source: e })?;

        let temp_path = config_path.with_extension("toml.tmp");
        std::fs::write(&temp_path, &content).map_err(|e| ConfigError::Io {
            path: temp_path.clone(),
            source: e,
        })?;
        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        Ok(config_path)
    }

    /// Migrate config from an older version.
    fn migrate(mut config: Self) -> Self {
        // Version 0 files predate the resilience section
        if config.version == 0 {
            config.resilience = ResilienceConfig::default();
            config.version = 1;
        }

        config
    }

    /// Get the config directory.
    /// Priority: SIDECAR_CONFIG_DIR env var > ./.sidecar/ (relative to cwd)
    pub fn config_dir() -> ConfigErrorResult<PathBuf> {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }

        let cwd = std::env::current_dir()
            .map_err(|_| ConfigError::config("Cannot determine current working directory"))?;
        Ok(cwd.join(DEFAULT_CONFIG_DIR))
    }

    /// Validate all sections.
    pub fn validate(&self) -> ConfigErrorResult<()> {
        if self.version > CONFIG_VERSION {
            return Err(ConfigError::config(format!(
                "config version {} is newer than supported version {}",
                self.version, CONFIG_VERSION
            )));
        }

        self.worker.validate()?;
        self.handshake.validate()?;
        self.health.validate()?;
        self.resilience.validate()?;

        Ok(())
    }

    /// Resolve the worker invocation for the configured layout.
    pub fn resolve_launch(&self) -> ConfigErrorResult<WorkerLaunch> {
        self.worker.resolve(&self.handshake.port_file_path())
    }

    /// Log configuration summary.
    pub fn log_summary(&self) {
        info!("Configuration loaded:");
        info!(
            "  worker: {} {:?} ({})",
            self.worker.program, self.worker.args, self.worker.layout
        );
        info!(
            "  handshake: {} (poll {}ms, timeout {}ms)",
            self.handshake.port_file_path().display(),
            self.handshake.poll_interval_ms,
            self.handshake.startup_timeout_ms
        );
        info!(
            "  health: {} (timeout {}ms)",
            self.health.path, self.health.timeout_ms
        );
        info!(
            "  resilience: max_restarts={}, delay={}ms ({}), shutdown={}ms",
            self.resilience.max_restarts,
            self.resilience.restart_delay_ms,
            self.resilience.backoff,
            self.resilience.shutdown_timeout_ms
        );
        info!("  logging: {} -> {}", self.logging.level, self.logging.dir);
    }

    fn apply_env_overrides(&mut self) {
        // Worker
        Self::apply_env_string("SIDECAR_WORKER_PROGRAM", &mut self.worker.program);
        Self::apply_env_parse("SIDECAR_WORKER_LAYOUT", &mut self.worker.layout);
        Self::apply_env_option_path("SIDECAR_WORKER_DIR", &mut self.worker.working_dir);
        Self::apply_env_option_path("SIDECAR_PACKAGED_ROOT", &mut self.worker.packaged_root);

        // Handshake
        Self::apply_env_string("SIDECAR_PORT_FILE_NAME", &mut self.handshake.port_file_name);
        Self::apply_env_option_path("SIDECAR_HANDSHAKE_DIR", &mut self.handshake.directory);
        Self::apply_env_parse(
            "SIDECAR_POLL_INTERVAL_MS",
            &mut self.handshake.poll_interval_ms,
        );
        Self::apply_env_parse(
            "SIDECAR_STARTUP_TIMEOUT_MS",
            &mut self.handshake.startup_timeout_ms,
        );

        // Health
        Self::apply_env_string("SIDECAR_HEALTH_PATH", &mut self.health.path);
        Self::apply_env_parse("SIDECAR_HEALTH_TIMEOUT_MS", &mut self.health.timeout_ms);

        // Resilience
        Self::apply_env_parse("SIDECAR_MAX_RESTARTS", &mut self.resilience.max_restarts);
        Self::apply_env_parse(
            "SIDECAR_RESTART_DELAY_MS",
            &mut self.resilience.restart_delay_ms,
        );
        Self::apply_env_parse("SIDECAR_BACKOFF", &mut self.resilience.backoff);
        Self::apply_env_parse("SIDECAR_MAX_BACKOFF_MS", &mut self.resilience.max_backoff_ms);
        Self::apply_env_parse(
            "SIDECAR_SHUTDOWN_TIMEOUT_MS",
            &mut self.resilience.shutdown_timeout_ms,
        );

        // Logging
        Self::apply_env_parse("SIDECAR_LOG_LEVEL", &mut self.logging.level);
        Self::apply_env_string("SIDECAR_LOG_DIR", &mut self.logging.dir);
    }

    /// Helper: Apply environment variable override for String values
    fn apply_env_string(var_name: &str, target: &mut String) {
        if let Ok(val) = std::env::var(var_name) {
            *target = val;
        }
    }

    /// Helper: Apply environment variable override for parseable values
    fn apply_env_parse<T: std::str::FromStr>(var_name: &str, target: &mut T) {
        if let Ok(val) = std::env::var(var_name)
            && let Ok(parsed) = val.parse()
        {
            *target = parsed;
        }
    }

    /// Helper: Apply environment variable override for Option<PathBuf> values
    fn apply_env_option_path(var_name: &str, target: &mut Option<PathBuf>) {
        if let Ok(val) = std::env::var(var_name) {
            *target = Some(PathBuf::from(val));
        }
    }
}
