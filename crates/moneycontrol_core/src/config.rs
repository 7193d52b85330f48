//! Runtime configuration resolved from environment variables.
//!
//! | variable                 | default                              |
//! |--------------------------|--------------------------------------|
//! | `MONEYCONTROL_DB_PATH`   | `<temp_dir>/moneycontrol.sqlite3`    |
//! | `MONEYCONTROL_LOG_DIR`   | `<temp_dir>/moneycontrol-logs`       |
//! | `MONEYCONTROL_LOG_LEVEL` | `default_log_level()`                |
//!
//! Blank values are treated as unset.

use crate::logging::default_log_level;
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "MONEYCONTROL_DB_PATH";
pub const LOG_DIR_ENV: &str = "MONEYCONTROL_LOG_DIR";
pub const LOG_LEVEL_ENV: &str = "MONEYCONTROL_LOG_LEVEL";

const DEFAULT_DB_FILE_NAME: &str = "moneycontrol.sqlite3";
const DEFAULT_LOG_DIR_NAME: &str = "moneycontrol-logs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: String,
}

impl AppConfig {
    /// Resolves configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through `lookup`, which maps a variable name
    /// to its raw value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            db_path: non_blank(DB_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME)),
            log_dir: non_blank(LOG_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_LOG_DIR_NAME)),
            log_level: non_blank(LOG_LEVEL_ENV)
                .unwrap_or_else(|| default_log_level().to_string()),
        }
    }
}
