use crate::tests::{EnvGuard, setup_config_dir};
use crate::{BackoffStrategy, CONFIG_VERSION, ConfigError, LaunchLayout, SidecarConfig};

use googletest::assert_that;
use googletest::prelude::{anything, eq, err, none, ok, pat, some};
use std::path::PathBuf;

use log::LevelFilter;
use serial_test::serial;

// =========================================================================
// Loading
// =========================================================================

#[test]
#[serial]
fn given_no_config_file_when_load_then_defaults_used() {
    let (_temp, _guard) = setup_config_dir();

    let config = SidecarConfig::load().unwrap();

    assert_that!(config.version, eq(CONFIG_VERSION));
    assert_that!(config.handshake.poll_interval_ms, eq(100));
    assert_that!(config.handshake.startup_timeout_ms, eq(5000));
    assert_that!(config.resilience.max_restarts, eq(3));
    assert_that!(config.resilience.restart_delay_ms, eq(1000));
    assert_that!(config.resilience.backoff, eq(BackoffStrategy::Fixed));
    assert_that!(config.health.path, eq("/health"));
    assert_that!(config.worker.layout, eq(LaunchLayout::Development));
    assert_that!(config.validate(), ok(anything()));
}

#[test]
#[serial]
fn given_partial_toml_when_load_then_missing_fields_defaulted() {
    let (temp, _guard) = setup_config_dir();
    std::fs::write(
        temp.path().join("config.toml"),
        r#"
[worker]
program = "/opt/ml/bin/worker"
args = ["--serve"]

[resilience]
max_restarts = 5
backoff = "exponential"
"#,
    )
    .unwrap();

    let config = SidecarConfig::load().unwrap();

    assert_that!(config.worker.program, eq("/opt/ml/bin/worker"));
    assert_that!(config.worker.args, eq(&vec![String::from("--serve")]));
    assert_that!(config.resilience.max_restarts, eq(5));
    assert_that!(config.resilience.backoff, eq(BackoffStrategy::Exponential));
    assert_that!(config.handshake.poll_interval_ms, eq(100));
}

#[test]
#[serial]
fn given_invalid_toml_when_load_then_toml_error() {
    let (temp, _guard) = setup_config_dir();
    std::fs::write(temp.path().join("config.toml"), "[worker\nprogram =").unwrap();

    let result = SidecarConfig::load();

    assert_that!(result, err(pat!(ConfigError::Toml { .. })));
}

#[test]
#[serial]
fn given_version_zero_file_when_load_then_migrated() {
    let (temp, _guard) = setup_config_dir();
    std::fs::write(temp.path().join("config.toml"), "version = 0\n").unwrap();

    let config = SidecarConfig::load().unwrap();

    assert_that!(config.version, eq(CONFIG_VERSION));
}

#[test]
#[serial]
fn given_env_overrides_when_load_then_env_wins_over_file() {
    let (temp, _guard) = setup_config_dir();
    std::fs::write(
        temp.path().join("config.toml"),
        "[handshake]\npoll_interval_ms = 250\n",
    )
    .unwrap();
    let _poll = EnvGuard::set("SIDECAR_POLL_INTERVAL_MS", "50");
    let _restarts = EnvGuard::set("SIDECAR_MAX_RESTARTS", "7");
    let _layout = EnvGuard::set("SIDECAR_WORKER_LAYOUT", "packaged");
    let _root = EnvGuard::set("SIDECAR_PACKAGED_ROOT", "/opt/app/resources");
    let _level = EnvGuard::set("SIDECAR_LOG_LEVEL", "debug");

    let config = SidecarConfig::load().unwrap();

    assert_that!(config.handshake.poll_interval_ms, eq(50));
    assert_that!(config.resilience.max_restarts, eq(7));
    assert_that!(config.worker.layout, eq(LaunchLayout::Packaged));
    assert_that!(
        config.worker.packaged_root,
        some(eq(&PathBuf::from("/opt/app/resources")))
    );
    assert_that!(config.logging.level.0, eq(LevelFilter::Debug));
}

#[test]
#[serial]
fn given_unknown_or_mistyped_log_level_when_load_then_falls_back_to_info() {
    let (temp, _guard) = setup_config_dir();
    std::fs::write(
        temp.path().join("config.toml"),
        "[logging]\nlevel = \"verbose\"\n",
    )
    .unwrap();
    assert_that!(SidecarConfig::load().unwrap().logging.level.0, eq(LevelFilter::Info));

    std::fs::write(temp.path().join("config.toml"), "[logging]\nlevel = 3\n").unwrap();
    assert_that!(SidecarConfig::load().unwrap().logging.level.0, eq(LevelFilter::Info));

    let _level = EnvGuard::set("SIDECAR_LOG_LEVEL", "WARN");
    assert_that!(SidecarConfig::load().unwrap().logging.level.0, eq(LevelFilter::Warn));
}

#[test]
#[serial]
fn given_unparseable_env_value_when_load_then_value_ignored() {
    let (_temp, _guard) = setup_config_dir();
    let _restarts = EnvGuard::set("SIDECAR_MAX_RESTARTS", "many");
    let _backoff = EnvGuard::set("SIDECAR_BACKOFF", "random");

    let config = SidecarConfig::load().unwrap();

    assert_that!(config.resilience.max_restarts, eq(3));
    assert_that!(config.resilience.backoff, eq(BackoffStrategy::Fixed));
}

#[test]
#[serial]
fn given_no_env_var_when_config_dir_then_relative_to_cwd() {
    let _guard = EnvGuard::remove(crate::CONFIG_DIR_ENV);

    let dir = SidecarConfig::config_dir().unwrap();

    assert!(dir.ends_with(".sidecar"));
}

// =========================================================================
// Saving
// =========================================================================

#[test]
#[serial]
fn given_modified_config_when_save_then_round_trips_through_load() {
    let (temp, _guard) = setup_config_dir();
    let mut config = SidecarConfig::default();
    config.worker.program = String::from("/usr/bin/env");
    config.handshake.startup_timeout_ms = 9000;

    let path = config.save(temp.path()).unwrap();
    let loaded = SidecarConfig::load().unwrap();

    assert!(path.exists());
    assert!(!temp.path().join("config.toml.tmp").exists());
    assert_that!(loaded.worker.program, eq("/usr/bin/env"));
    assert_that!(loaded.handshake.startup_timeout_ms, eq(9000));
    assert_that!(loaded.handshake.directory, none());
}
