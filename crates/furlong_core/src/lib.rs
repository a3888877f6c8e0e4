//! # FURLONG Core
//!
//! Primitives shared by the race and betting crates.
//!
//! ## Modules
//!
//! - `signal`: latest-value signals and replay-free event streams
//! - `timer`: virtual-time scheduler with cancellable timers, plus a
//!   wall-clock driver thread
//! - `countdown`: one-shot per-second countdown built on the scheduler
//!
//! ## Example
//!
//! ```rust
//! use furlong_core::{CountdownTimer, Scheduler, Signal};
//! use std::time::Duration;
//!
//! let scheduler = Scheduler::new();
//! let countdown = CountdownTimer::new(scheduler.clone());
//! let display = Signal::new(0u32);
//!
//! countdown.start(3, || println!("go"), Some(display.clone()));
//! scheduler.advance(Duration::from_secs(3));
//! assert_eq!(display.get(), 0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod countdown;
pub mod signal;
pub mod timer;

pub use countdown::{CountdownTimer, COUNTDOWN_STEP};
pub use signal::{EventStream, Feed, Signal, Subscription};
pub use timer::{Scheduler, TimerDriver, TimerHandle, MIN_PERIOD};
