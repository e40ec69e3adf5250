//! Engine configuration.
//!
//! Settings are plain serde structs, read from TOML. Missing fields take
//! their defaults, so an empty file is a valid configuration.

use super::MAX_PLY;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur when loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    /// A field holds a value the engine cannot run with.
    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Tunables for a search episode.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Transposition table slots. 0 disables the table.
    pub hash_entries: usize,
    /// Deepest iteration the engine will start, capped at [`MAX_PLY`].
    pub max_depth: u32,
    /// Nodes between checks of the stop flag and the clock.
    pub check_interval: u64,
    /// Extend leaf nodes with a capture search.
    pub quiescence: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            hash_entries: 1 << 18,
            max_depth: 64,
            check_interval: 2048,
            quiescence: true,
        }
    }
}

impl EngineConfig {
    /// Reads and validates a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if the file cannot be read,
    /// [`ConfigError::ParseError`] if it is not valid TOML, and
    /// [`ConfigError::Invalid`] if a value fails [`Self::validate`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.check_interval == 0 {
            return Err(ConfigError::Invalid {
                field: "check_interval",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "max_depth",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// `max_depth` clamped to what the search stack supports.
    pub fn depth_limit(&self) -> u32 {
        self.max_depth.clamp(1, MAX_PLY as u32)
    }
}
