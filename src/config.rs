//! Registry configuration.
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```
//! use tender_core::config::RegistryConfig;
//! use std::time::Duration;
//!
//! let config = RegistryConfig::from_toml_str(r#"
//!     data_dir = "/var/lib/tenders"
//!     waterfall_words = 15
//!     training_timeout_secs = 120
//! "#).unwrap();
//!
//! assert_eq!(config.waterfall_words, 15);
//! assert_eq!(config.importance_words, 200);
//! assert_eq!(config.training_timeout(), Duration::from_secs(120));
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_IMPORTANCE_WORDS: usize = 200;
pub const DEFAULT_WATERFALL_WORDS: usize = 10;
pub const DEFAULT_TRAINING_TIMEOUT_SECS: u64 = 600;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Directory holding one archive file per country.
    pub data_dir: PathBuf,

    /// Number of positive and negative words kept by the global ranking.
    pub importance_words: usize,

    /// Number of individual bars per sign in a tender waterfall.
    pub waterfall_words: usize,

    /// Upper bound on a single trainer invocation.
    pub training_timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            importance_words: DEFAULT_IMPORTANCE_WORDS,
            waterfall_words: DEFAULT_WATERFALL_WORDS,
            training_timeout_secs: DEFAULT_TRAINING_TIMEOUT_SECS,
        }
    }
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads and validates configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.importance_words == 0 {
            return Err(ConfigError::Invalid("importance_words must be positive".into()));
        }
        if self.waterfall_words == 0 {
            return Err(ConfigError::Invalid("waterfall_words must be positive".into()));
        }
        if self.training_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "training_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_importance_words(mut self, n: usize) -> Self {
        self.importance_words = n;
        self
    }

    pub fn with_waterfall_words(mut self, k: usize) -> Self {
        self.waterfall_words = k;
        self
    }

    pub fn with_training_timeout(mut self, timeout: Duration) -> Self {
        self.training_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn training_timeout(&self) -> Duration {
        Duration::from_secs(self.training_timeout_secs)
    }
}
