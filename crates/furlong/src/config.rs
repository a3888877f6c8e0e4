//! # Configuration
//!
//! TOML configuration for races and the simulator. Every field has a
//! default, so an empty file is a valid configuration.
//!
//! ```toml
//! [race]
//! competitor_count = 4
//! winning_distance = 2000
//! tick_interval_ms = 250
//! pre_race_secs = 30
//! post_race_secs = 10
//! advance_digits = 8
//! alphabet = "full"
//! advance_mode = "chunked"
//!
//! [simulation]
//! race_count = 3
//! bettor_count = 8
//! max_stake = 500
//! runs = 1
//! realtime = false
//! ```

use furlong_race::RaceConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Simulator parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Races run side by side, ids `1..=race_count`.
    pub race_count: u64,
    /// Simulated bettors, each placing one bet per race per run.
    pub bettor_count: usize,
    /// Largest simulated stake.
    pub max_stake: u64,
    /// Times each race is run.
    pub runs: u32,
    /// Drive timers from the wall clock instead of jumping between deadlines.
    pub realtime: bool,
    /// Seed for simulated bettors. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            race_count: 3,
            bettor_count: 8,
            max_stake: 500,
            runs: 1,
            realtime: false,
            seed: None,
        }
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FurlongConfig {
    /// Template for every race.
    pub race: RaceConfig,
    /// Simulator parameters.
    pub simulation: SimulationConfig,
}

impl FurlongConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed input, [`ConfigError::Invalid`]
    /// for out-of-range values.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`FurlongConfig::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Serializes to TOML.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if a value cannot be represented in TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Checks every value.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.race
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.simulation.race_count == 0 {
            return Err(ConfigError::Invalid("simulation.race_count must be > 0".into()));
        }
        if self.simulation.max_stake == 0 {
            return Err(ConfigError::Invalid("simulation.max_stake must be > 0".into()));
        }
        Ok(())
    }
}
