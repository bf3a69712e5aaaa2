//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `ttl_secs` is 0
    /// - `max_parallel_downloads` is 0 or exceeds 64
    /// - `max_attempts` is 0 or exceeds 10
    ///
    /// Returns `ConfigError::Missing` if persistence is enabled without a `db_path`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.ttl_secs == 0 {
            return Err(ConfigError::Invalid { field: "ttl_secs".into(), reason: "must be greater than 0".into() });
        }

        if self.max_parallel_downloads == 0 || self.max_parallel_downloads > 64 {
            return Err(ConfigError::Invalid {
                field: "max_parallel_downloads".into(),
                reason: "must be between 1 and 64".into(),
            });
        }

        if self.max_attempts == 0 || self.max_attempts > 10 {
            return Err(ConfigError::Invalid { field: "max_attempts".into(), reason: "must be between 1 and 10".into() });
        }

        if self.persist && self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Missing {
                field: "db_path".into(),
                hint: "Set FETCHCACHE_DB_PATH or disable persistence with FETCHCACHE_PERSIST=false".into(),
            });
        }

        if !self.persist && self.db_path != AppConfig::default().db_path {
            tracing::warn!(
                db_path = %self.db_path.display(),
                "db_path is set but persistence is disabled; the path will not be used"
            );
        }

        Ok(())
    }
}
