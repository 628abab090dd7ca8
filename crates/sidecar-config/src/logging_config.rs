use crate::{DEFAULT_LOG_DIRECTORY, DEFAULT_LOG_FILE_PREFIX, DEFAULT_LOG_MAX_FILES, LogLevel};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (off, error, warn, info, debug, trace)
    pub level: LogLevel,
    /// Log directory, relative to the config directory
    pub dir: String,
    /// Prefix of the rolling log files
    pub file_prefix: String,
    /// Number of daily log files to keep
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            dir: String::from(DEFAULT_LOG_DIRECTORY),
            file_prefix: String::from(DEFAULT_LOG_FILE_PREFIX),
            max_files: DEFAULT_LOG_MAX_FILES,
        }
    }
}
