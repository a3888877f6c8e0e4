//! # Race Configuration
//!
//! Parameters fixed for the lifetime of one race instance.

use crate::advance::{AdvanceMode, DigitAlphabet};
use crate::error::{RaceError, RaceResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Competitors per race.
pub const DEFAULT_COMPETITOR_COUNT: usize = 4;

/// Position a competitor must reach to finish.
pub const DEFAULT_WINNING_DISTANCE: u64 = 2000;

/// Stable of runners that rosters are drawn from.
pub const DEFAULT_CATALOG: &[&str] = &[
    "Thunderhoof",
    "Silver Comet",
    "Midnight Run",
    "Copper Kettle",
    "Dust Devil",
    "Lucky Clover",
    "Iron Mane",
    "Blue Bayou",
    "Red Rocket",
    "Gold Rush",
    "Shadowfax",
    "Prairie Wind",
];

/// Configuration of one race instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    /// Competitors drawn per run.
    pub competitor_count: usize,
    /// Position threshold that finishes a competitor.
    pub winning_distance: u64,
    /// Interval between ticks while running (ms).
    pub tick_interval_ms: u64,
    /// Pre-race countdown (seconds).
    pub pre_race_secs: u32,
    /// Post-race countdown (seconds).
    pub post_race_secs: u32,
    /// Digits drawn per tick, shared out across competitors.
    pub advance_digits: usize,
    /// Digit alphabet for advance draws.
    pub alphabet: DigitAlphabet,
    /// Chunked or independent advance draws.
    pub advance_mode: AdvanceMode,
    /// Fixed seed for reproducible races. `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Names rosters are drawn from.
    pub catalog: Vec<String>,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            competitor_count: DEFAULT_COMPETITOR_COUNT,
            winning_distance: DEFAULT_WINNING_DISTANCE,
            tick_interval_ms: 250,
            pre_race_secs: 30,
            post_race_secs: 10,
            advance_digits: 8,
            alphabet: DigitAlphabet::Full,
            advance_mode: AdvanceMode::Chunked,
            seed: None,
            catalog: DEFAULT_CATALOG.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl RaceConfig {
    /// Tick interval as a duration.
    #[inline]
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Checks that races built from this config can run to completion.
    ///
    /// # Errors
    ///
    /// Returns [`RaceError::InvalidConfig`] for zero counts or distances, and
    /// [`RaceError::CatalogTooSmall`] when the catalog cannot fill a roster.
    pub fn validate(&self) -> RaceResult<()> {
        if self.competitor_count == 0 {
            return Err(RaceError::InvalidConfig("competitor_count must be > 0".into()));
        }
        if self.winning_distance == 0 {
            return Err(RaceError::InvalidConfig("winning_distance must be > 0".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(RaceError::InvalidConfig("tick_interval_ms must be > 0".into()));
        }
        if self.advance_digits < self.competitor_count {
            return Err(RaceError::InvalidConfig(format!(
                "advance_digits ({}) must be at least competitor_count ({})",
                self.advance_digits, self.competitor_count
            )));
        }
        if self.catalog.len() < self.competitor_count {
            return Err(RaceError::CatalogTooSmall {
                requested: self.competitor_count,
                available: self.catalog.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RaceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.competitor_count, 4);
        assert_eq!(config.tick_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_rejects_short_digit_budget() {
        let config = RaceConfig {
            advance_digits: 3,
            ..RaceConfig::default()
        };
        assert!(matches!(config.validate(), Err(RaceError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_small_catalog() {
        let config = RaceConfig {
            catalog: vec!["Solo".into()],
            ..RaceConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(RaceError::CatalogTooSmall {
                requested: 4,
                available: 1
            })
        );
    }
}
