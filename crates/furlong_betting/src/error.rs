//! # Wager Error Types
//!
//! All errors that can occur when placing a wager.

use furlong_race::{RaceError, RaceId, RaceState, Slot};
use thiserror::Error;

/// Errors that can occur when placing a wager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WagerError {
    /// The outcome slot is outside the race's competitor range.
    #[error("invalid outcome: slot {slot} outside 0..{competitors}")]
    InvalidOutcome {
        /// Slot that was requested.
        slot: Slot,
        /// Competitors per race.
        competitors: usize,
    },

    /// The stake is not strictly positive.
    #[error("invalid stake: must be greater than zero")]
    InvalidStake,

    /// Wagering on this race is closed.
    #[error("race {race_id} is not accepting wagers (state: {state})")]
    RaceNotAcceptingWagers {
        /// Race the wager was for.
        race_id: RaceId,
        /// State the race was in.
        state: RaceState,
    },

    /// Accepting the stake would overflow the race's total stake.
    #[error("stake of {amount} would overflow the total of race {race_id}")]
    StakeOverflow {
        /// Race the wager was for.
        race_id: RaceId,
        /// Stake that was refused.
        amount: u64,
    },

    /// The race lookup failed.
    #[error(transparent)]
    Race(#[from] RaceError),
}

/// Result type for wager operations.
pub type WagerResult<T> = Result<T, WagerError>;
