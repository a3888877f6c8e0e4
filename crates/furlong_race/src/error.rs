//! # Race Error Types
//!
//! All errors that can occur in the race subsystem.

use crate::instance::RaceId;
use thiserror::Error;

/// Errors that can occur in the race subsystem.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RaceError {
    /// A race with this identifier already exists in the registry.
    #[error("race {0} already exists")]
    DuplicateRace(RaceId),

    /// No race with this identifier exists in the registry.
    #[error("race not found: {0}")]
    RaceNotFound(RaceId),

    /// The competitor catalog cannot fill the requested roster.
    #[error("catalog too small: requested {requested} competitors, catalog has {available}")]
    CatalogTooSmall {
        /// Competitors requested.
        requested: usize,
        /// Entries in the catalog.
        available: usize,
    },

    /// Race parameters are unusable.
    #[error("invalid race configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for race operations.
pub type RaceResult<T> = Result<T, RaceError>;
