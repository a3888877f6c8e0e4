//! # FURLONG
//!
//! Race simulation and pari-mutuel pools, integrated.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Paddock                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌──────────────┐   race ids    ┌──────────────┐             │
//! │  │ RaceRegistry │──────────────>│ PoolManager  │             │
//! │  │              │               │              │             │
//! │  │  • instances │   state       │  • Pool/race │             │
//! │  │  • timers    │──────┐        │  • odds      │             │
//! │  └──────────────┘      ▼        └──────────────┘             │
//! │                 ┌──────────────┐       ▲                     │
//! │                 │  BetManager  │───────┘ accepted bets       │
//! │                 └──────────────┘                             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: TOML configuration
//! - `paddock`: registry, ledger and pools wired together

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod paddock;

// Re-export the layers
pub use furlong_betting as betting;
pub use furlong_core as core;
pub use furlong_race as race;

pub use config::{ConfigError, FurlongConfig, SimulationConfig};
pub use paddock::Paddock;
