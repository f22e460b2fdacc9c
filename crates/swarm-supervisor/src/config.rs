//! # Supervisor Configuration
//!
//! Configuration for the connection supervisor, loadable from the
//! `[supervisor]` table of a TOML file.
//!
//! ```toml
//! [supervisor]
//! max_identity_bytes = 16384
//! access_key_len = 32
//! case_insensitive_channels = true
//! ```
//!
//! Missing keys take their defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default upper bound on an identity payload.
pub const DEFAULT_MAX_IDENTITY_BYTES: usize = 16 * 1024;

/// Connection supervisor configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Identity payloads larger than this are rejected as malformed.
    pub max_identity_bytes: usize,

    /// Required decoded access-key length in bytes. `None` accepts any
    /// non-empty key.
    pub access_key_len: Option<usize>,

    /// Match channels to discovery keys ignoring hex case.
    pub case_insensitive_channels: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_identity_bytes: DEFAULT_MAX_IDENTITY_BYTES,
            access_key_len: None,
            case_insensitive_channels: true,
        }
    }
}

impl SupervisorConfig {
    /// Create a config for testing (small identity limit).
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            max_identity_bytes: 1024,
            access_key_len: None,
            case_insensitive_channels: true,
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let defaults = Self::default();
        let sc = file.supervisor;
        let config = Self {
            max_identity_bytes: sc.max_identity_bytes.unwrap_or(defaults.max_identity_bytes),
            access_key_len: sc.access_key_len.or(defaults.access_key_len),
            case_insensitive_channels: sc
                .case_insensitive_channels
                .unwrap_or(defaults.case_insensitive_channels),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values the supervisor cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_identity_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_identity_bytes must be greater than zero".to_string(),
            ));
        }
        if self.access_key_len == Some(0) {
            return Err(ConfigError::Invalid(
                "access_key_len must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration file structure.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    supervisor: SupervisorSection,
}

#[derive(Debug, Deserialize, Default)]
struct SupervisorSection {
    max_identity_bytes: Option<usize>,
    access_key_len: Option<usize>,
    case_insensitive_channels: Option<bool>,
}

/// Errors that can occur during config loading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("Failed to read {path}: {error}")]
    Io {
        /// Path of the file that failed to load.
        path: String,
        /// Error message from the I/O operation.
        error: String,
    },

    /// TOML parsing error.
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// A value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}
