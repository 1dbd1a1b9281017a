//! Cache configuration loaded from TOML
//!
//! Every field has a default, so an empty document is a valid configuration.
//!
//! ```toml
//! maximum_size = 20000
//! expire_after_write_ms = 600000
//! ask_timeout_ms = 10000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse TOML content.
    #[error("failed to parse config TOML: {source}")]
    Toml {
        #[from]
        source: toml::de::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Enrichment cache settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached projections before the oldest are evicted
    #[serde(default = "default_maximum_size")]
    pub maximum_size: usize,

    /// Lifetime of a projection after it was last written
    #[serde(default = "default_expire_after_write_ms")]
    pub expire_after_write_ms: u64,

    /// How long a caller waits for an authoritative retrieval
    #[serde(default = "default_ask_timeout_ms")]
    pub ask_timeout_ms: u64,
}

fn default_maximum_size() -> usize {
    20_000
}

fn default_expire_after_write_ms() -> u64 {
    600_000
}

fn default_ask_timeout_ms() -> u64 {
    10_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            maximum_size: default_maximum_size(),
            expire_after_write_ms: default_expire_after_write_ms(),
            ask_timeout_ms: default_ask_timeout_ms(),
        }
    }
}

impl CacheConfig {
    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the string is not valid TOML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`CacheConfig::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Reject zero sizes and timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("maximum_size", self.maximum_size as u64),
            ("expire_after_write_ms", self.expire_after_write_ms),
            ("ask_timeout_ms", self.ask_timeout_ms),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn expire_after_write(&self) -> Duration {
        Duration::from_millis(self.expire_after_write_ms)
    }

    pub fn ask_timeout(&self) -> Duration {
        Duration::from_millis(self.ask_timeout_ms)
    }
}
