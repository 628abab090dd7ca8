mod config;
mod launch;

use std::env;
use std::ffi::OsString;

use tempfile::TempDir;

/// Sets or clears one environment variable and puts the previous value back
/// on drop. Only use from `#[serial]` tests.
pub(crate) struct EnvGuard {
    key: &'static str,
    previous: Option<OsString>,
}

impl EnvGuard {
    pub(crate) fn set(key: &'static str, value: &str) -> Self {
        let guard = Self::capture(key);
        unsafe { env::set_var(key, value) };
        guard
    }

    pub(crate) fn remove(key: &'static str) -> Self {
        let guard = Self::capture(key);
        unsafe { env::remove_var(key) };
        guard
    }

    fn capture(key: &'static str) -> Self {
        Self {
            key,
            previous: env::var_os(key),
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(value) => unsafe { env::set_var(self.key, value) },
            None => unsafe { env::remove_var(self.key) },
        }
    }
}

/// Temp config directory with SIDECAR_CONFIG_DIR pointing at it.
pub(crate) fn setup_config_dir() -> (TempDir, EnvGuard) {
    let temp = TempDir::new().unwrap();
    let guard = EnvGuard::set(crate::CONFIG_DIR_ENV, temp.path().to_str().unwrap());
    (temp, guard)
}
