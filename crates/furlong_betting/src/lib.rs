//! # FURLONG Betting
//!
//! Wagers and pari-mutuel pools.
//!
//! ## Data Flow
//!
//! ```text
//! generate_bet() ──validate──> BetManager ──accepted──> PoolManager ──route──> Pool
//!                    │                                      ▲                    │
//!            RaceStateSource                     race ids signal        bets / total / odds
//! ```
//!
//! ## Design Principles
//!
//! 1. **Integer stakes** - stakes and totals are `u64` token units; only odds
//!    are floating point
//! 2. **Gated on race state** - wagers are accepted only while a race is in PRE
//! 3. **Live odds** - every accepted bet republishes the pool's odds vector

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod ledger;
pub mod pool;

pub use error::{WagerError, WagerResult};
pub use ledger::{Bet, BetId, BetManager};
pub use pool::{compute_odds, Payout, Pool, PoolManager, PoolSignals};
