//! Configuration parsing and management.
//!
//! A stash is configured from a small TOML file:
//!
//! ```toml
//! min_confirmations = 32
//! resolver_timeout_ms = 10000
//! max_consignment_operations = 65536
//! database = "/var/lib/sealtrail/stash.db"
//! ```
//!
//! Every key is optional. Unknown keys are rejected so that typos do not
//! silently fall back to defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default confirmations before an anchored operation becomes final.
pub const DEFAULT_MIN_CONFIRMATIONS: u32 = 32;

/// Default bound on each resolver call.
pub const DEFAULT_RESOLVER_TIMEOUT_MS: u64 = 10_000;

/// Default cap on operations carried by one consignment.
pub const DEFAULT_MAX_CONSIGNMENT_OPERATIONS: usize = 65_536;

/// Stash configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StashConfig {
    /// Witness depth at which anchored operations become final.
    #[serde(default = "default_min_confirmations")]
    pub min_confirmations: u32,

    /// Timeout for each witness resolver call, in milliseconds.
    #[serde(default = "default_resolver_timeout_ms")]
    pub resolver_timeout_ms: u64,

    /// Largest consignment accepted by import.
    #[serde(default = "default_max_consignment_operations")]
    pub max_consignment_operations: usize,

    /// SQLite database path. State is kept in memory when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
}

const fn default_min_confirmations() -> u32 {
    DEFAULT_MIN_CONFIRMATIONS
}

const fn default_resolver_timeout_ms() -> u64 {
    DEFAULT_RESOLVER_TIMEOUT_MS
}

const fn default_max_consignment_operations() -> usize {
    DEFAULT_MAX_CONSIGNMENT_OPERATIONS
}

impl Default for StashConfig {
    fn default() -> Self {
        Self {
            min_confirmations: DEFAULT_MIN_CONFIRMATIONS,
            resolver_timeout_ms: DEFAULT_RESOLVER_TIMEOUT_MS,
            max_consignment_operations: DEFAULT_MAX_CONSIGNMENT_OPERATIONS,
            database: None,
        }
    }
}

impl StashConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid, has unknown keys, or fails
    /// [`validate`](Self::validate).
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for a zero confirmation
    /// threshold, timeout or consignment limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_confirmations == 0 {
            return Err(ConfigError::Validation(
                "min_confirmations must be at least 1".into(),
            ));
        }
        if self.resolver_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "resolver_timeout_ms must be positive".into(),
            ));
        }
        if self.max_consignment_operations == 0 {
            return Err(ConfigError::Validation(
                "max_consignment_operations must be positive".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub const fn resolver_timeout(&self) -> Duration {
        Duration::from_millis(self.resolver_timeout_ms)
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// I/O error reading configuration file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Validation error.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = StashConfig::from_toml("").unwrap();
        assert_eq!(config, StashConfig::default());
        assert_eq!(config.min_confirmations, 32);
        assert_eq!(config.resolver_timeout(), Duration::from_secs(10));
        assert!(config.database.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let config = StashConfig::from_toml(
            r#"
            min_confirmations = 6
            resolver_timeout_ms = 2500
            max_consignment_operations = 100
            database = "/tmp/stash.db"
            "#,
        )
        .unwrap();
        assert_eq!(config.min_confirmations, 6);
        assert_eq!(config.resolver_timeout_ms, 2500);
        assert_eq!(config.max_consignment_operations, 100);
        assert_eq!(config.database, Some(PathBuf::from("/tmp/stash.db")));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = StashConfig::from_toml("min_confirmation = 6").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_zero_values_rejected() {
        for toml in [
            "min_confirmations = 0",
            "resolver_timeout_ms = 0",
            "max_consignment_operations = 0",
        ] {
            let err = StashConfig::from_toml(toml).unwrap_err();
            assert!(matches!(err, ConfigError::Validation(_)), "{toml}");
        }
    }

    #[test]
    fn test_toml_round_trip() {
        let config = StashConfig {
            min_confirmations: 3,
            database: Some(PathBuf::from("stash.db")),
            ..StashConfig::default()
        };
        let back = StashConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "min_confirmations = 1").unwrap();
        let config = StashConfig::from_file(file.path()).unwrap();
        assert_eq!(config.min_confirmations, 1);

        let missing = StashConfig::from_file(Path::new("/nonexistent/sealtrail.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
