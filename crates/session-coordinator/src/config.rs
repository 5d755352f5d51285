//! Session coordinator configuration.
//!
//! Configuration is loaded from environment variables with defaults for
//! every field; nothing is required.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::model::EventPolicy;

/// Default coordinator instance label.
pub const DEFAULT_COORDINATOR_ID: &str = "sc-local";

/// Default bound on waiting for the voice connection during start.
pub const DEFAULT_JOIN_TIMEOUT_SECONDS: u64 = 15;

/// Default advisory lock duration.
pub const DEFAULT_LOCK_DURATION_SECONDS: u64 = 10;

/// Default notification broadcast capacity.
pub const DEFAULT_NOTIFICATION_BUFFER: usize = 1024;

/// Session coordinator configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    /// Instance label used in log fields (default: "sc-local").
    pub coordinator_id: String,

    /// Wait bound for `join_channel` during session start (default: 15s).
    pub join_timeout_seconds: u64,

    /// Lock duration of the default policy for new sessions (default: 10s).
    pub lock_duration_seconds: u64,

    /// Capacity of the notification broadcast channel (default: 1024).
    pub notification_buffer: usize,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("coordinator_id", &self.coordinator_id)
            .field("join_timeout_seconds", &self.join_timeout_seconds)
            .field("lock_duration_seconds", &self.lock_duration_seconds)
            .field("notification_buffer", &self.notification_buffer)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            coordinator_id: DEFAULT_COORDINATOR_ID.to_string(),
            join_timeout_seconds: DEFAULT_JOIN_TIMEOUT_SECONDS,
            lock_duration_seconds: DEFAULT_LOCK_DURATION_SECONDS,
            notification_buffer: DEFAULT_NOTIFICATION_BUFFER,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// See [`Config::from_vars`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// Unparseable values fall back to defaults; zero values are rejected.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidValue` when a duration or buffer size is zero.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let coordinator_id = vars
            .get("SC_COORDINATOR_ID")
            .filter(|s| !s.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_COORDINATOR_ID.to_string());

        let join_timeout_seconds = vars
            .get("SC_JOIN_TIMEOUT_SECONDS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_JOIN_TIMEOUT_SECONDS);

        let lock_duration_seconds = vars
            .get("SC_LOCK_DURATION_SECONDS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_LOCK_DURATION_SECONDS);

        let notification_buffer = vars
            .get("SC_NOTIFICATION_BUFFER")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_NOTIFICATION_BUFFER);

        if join_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "SC_JOIN_TIMEOUT_SECONDS must be greater than 0".to_string(),
            ));
        }
        if lock_duration_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "SC_LOCK_DURATION_SECONDS must be greater than 0".to_string(),
            ));
        }
        if notification_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "SC_NOTIFICATION_BUFFER must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            coordinator_id,
            join_timeout_seconds,
            lock_duration_seconds,
            notification_buffer,
        })
    }

    #[must_use]
    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_seconds)
    }

    /// Policy given to newly created sessions.
    #[must_use]
    pub fn default_policy(&self) -> EventPolicy {
        EventPolicy::with_lock_duration(Duration::from_secs(self.lock_duration_seconds))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_vars(&HashMap::new()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.coordinator_id, "sc-local");
        assert_eq!(config.join_timeout(), Duration::from_secs(15));
        assert_eq!(
            config.default_policy().lock_duration,
            Duration::from_secs(10)
        );
        assert_eq!(config.notification_buffer, 1024);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_vars(&vars(&[
            ("SC_COORDINATOR_ID", "sc-test"),
            ("SC_JOIN_TIMEOUT_SECONDS", "3"),
            ("SC_LOCK_DURATION_SECONDS", "20"),
            ("SC_NOTIFICATION_BUFFER", "8"),
        ]))
        .unwrap();

        assert_eq!(config.coordinator_id, "sc-test");
        assert_eq!(config.join_timeout_seconds, 3);
        assert_eq!(config.lock_duration_seconds, 20);
        assert_eq!(config.notification_buffer, 8);
    }

    #[test]
    fn test_unparseable_falls_back_to_default() {
        let config =
            Config::from_vars(&vars(&[("SC_JOIN_TIMEOUT_SECONDS", "soon")])).unwrap();
        assert_eq!(config.join_timeout_seconds, DEFAULT_JOIN_TIMEOUT_SECONDS);
    }

    #[test]
    fn test_zero_values_rejected() {
        for key in [
            "SC_JOIN_TIMEOUT_SECONDS",
            "SC_LOCK_DURATION_SECONDS",
            "SC_NOTIFICATION_BUFFER",
        ] {
            let result = Config::from_vars(&vars(&[(key, "0")]));
            assert!(
                matches!(result, Err(ConfigError::InvalidValue(ref msg)) if msg.contains(key)),
                "{key}"
            );
        }
    }

    #[test]
    fn test_debug_lists_fields() {
        let debug = format!("{:?}", Config::default());
        assert!(debug.contains("coordinator_id"));
        assert!(debug.contains("join_timeout_seconds"));
    }
}
