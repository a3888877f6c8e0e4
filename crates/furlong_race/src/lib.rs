//! # FURLONG Race
//!
//! Race simulation: random advances, competitor rosters, the per-race
//! lifecycle and the registry that owns every race.
//!
//! ## Architecture
//!
//! ```text
//! RaceRegistry ──owns──> RaceInstance ──tick──> AdvanceGenerator
//!      │                      │                        │
//!      │                      └──apply──> CompetitorRoster <──┘
//!      └── race_ids: Signal<Vec<RaceId>>
//! ```
//!
//! Every instance schedules its countdowns and ticks on a shared
//! [`furlong_core::Scheduler`]. Tests drive the scheduler directly; the
//! simulator binary hands it to a wall-clock driver.
//!
//! ## Example
//!
//! ```rust
//! use furlong_core::Scheduler;
//! use furlong_race::{RaceConfig, RaceRegistry, RaceState};
//! use std::time::Duration;
//!
//! let scheduler = Scheduler::new();
//! let registry = RaceRegistry::new(RaceConfig::default(), scheduler.clone());
//! registry.create_race(1, 5).unwrap();
//! registry.start_race(1).unwrap();
//!
//! scheduler.advance(Duration::from_secs(5));
//! assert_eq!(registry.race(1).unwrap().state(), RaceState::In);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod advance;
pub mod config;
pub mod error;
pub mod instance;
pub mod registry;
pub mod roster;

pub use advance::{split_digits, AdvanceGenerator, AdvanceMode, DigitAlphabet};
pub use config::{RaceConfig, DEFAULT_CATALOG, DEFAULT_COMPETITOR_COUNT, DEFAULT_WINNING_DISTANCE};
pub use error::{RaceError, RaceResult};
pub use instance::{RaceId, RaceInstance, RaceOutcome, RaceSignals, RaceState};
pub use registry::{RaceRegistry, RaceStateSource};
pub use roster::{Competitor, CompetitorRoster, Slot};
