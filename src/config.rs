//! Runtime configuration.
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `REMIT_DATABASE` | SQLite database file | `remit.db` |
//! | `REMIT_BUSY_TIMEOUT_MS` | How long a connection waits on a locked database | `5000` |
//! | `REMIT_STORE_TIMEOUT_MS` | Upper bound for one ledger unit of work | `10000` |

use std::env;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_DATABASE_PATH: &str = "remit.db";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_STORE_TIMEOUT_MS: u64 = 10_000;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Path to the SQLite database file.
    pub database_path: String,
    /// SQLite busy timeout. Writers touching the same rows queue up behind
    /// each other for at most this long.
    pub busy_timeout: Duration,
    /// Deadline for a whole transfer or deposit. On expiry the unit of work is
    /// rolled back and the caller sees a retryable store error.
    pub store_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: DEFAULT_DATABASE_PATH.to_string(),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
        }
    }
}

impl AppConfig {
    /// Load configuration from `REMIT_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            database_path: lookup("REMIT_DATABASE").unwrap_or(defaults.database_path),
            busy_timeout: millis_or(
                &lookup,
                "REMIT_BUSY_TIMEOUT_MS",
                defaults.busy_timeout,
            )?,
            store_timeout: millis_or(
                &lookup,
                "REMIT_STORE_TIMEOUT_MS",
                defaults.store_timeout,
            )?,
        })
    }

    pub fn with_database_path(mut self, path: impl Into<String>) -> Self {
        self.database_path = path.into();
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// sqlx connection URL. `create` allows the file to be created.
    pub fn database_url(&self, create: bool) -> String {
        if create {
            format!("sqlite:{}?mode=rwc", self.database_path)
        } else {
            format!("sqlite:{}", self.database_path)
        }
    }
}

fn millis_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_reads_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("REMIT_DATABASE", "/tmp/wallet.db"),
            ("REMIT_BUSY_TIMEOUT_MS", "250"),
            ("REMIT_STORE_TIMEOUT_MS", "1000"),
        ]))
        .unwrap();

        assert_eq!(config.database_path, "/tmp/wallet.db");
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert_eq!(config.store_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_rejects_bad_timeout() {
        let err = AppConfig::from_lookup(lookup_from(&[("REMIT_STORE_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "REMIT_STORE_TIMEOUT_MS".to_string(),
                value: "soon".to_string(),
            }
        );

        assert!(AppConfig::from_lookup(lookup_from(&[("REMIT_BUSY_TIMEOUT_MS", "0")])).is_err());
    }

    #[test]
    fn test_database_url() {
        let config = AppConfig::default().with_database_path("test.db");
        assert_eq!(config.database_url(true), "sqlite:test.db?mode=rwc");
        assert_eq!(config.database_url(false), "sqlite:test.db");
    }
}
