//! # Race Instance
//!
//! The lifecycle state machine of one race.
//!
//! ## States
//!
//! ```text
//!  start_race()
//!      │
//!      ▼
//!   ┌─────┐  pre countdown   ┌────┐  all finished   ┌──────┐  post countdown
//!   │ PRE │ ───────────────> │ IN │ ──────────────> │ POST │ ──────────────> completed
//!   └─────┘     reaches 0    └────┘                 └──────┘     reaches 0
//!      ▲                        │ tick every tick_interval
//!      └──── start_race() from any state (restart)
//! ```
//!
//! - **PRE**: wagers accepted, counting down to the start.
//! - **IN**: the tick loop advances the roster.
//! - **POST**: result decided, counting down before the instance idles.
//!
//! ## Concurrency
//!
//! All mutable state sits behind one mutex. Signals are published after the
//! lock is released. Timer callbacks carry the epoch they were scheduled in;
//! `start_race` and `stop_race` bump the epoch so stale callbacks do nothing.
//!
//! Transitions (start, stop, start of running, each tick, completion) are
//! serialized by a second, reentrant control lock held across their countdown
//! starts. A countdown is only started while its epoch is still current, so
//! a stop, from another thread or from a signal listener, cannot be undone.

use crate::advance::AdvanceGenerator;
use crate::config::RaceConfig;
use crate::error::RaceResult;
use crate::roster::{Competitor, CompetitorRoster, Slot};
use furlong_core::{CountdownTimer, EventStream, Scheduler, Signal, TimerHandle};
use parking_lot::{Mutex, ReentrantMutex};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};

/// Race identifier, unique within a registry.
pub type RaceId = u64;

/// Mixes the race id into a configured seed so sibling races differ.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Lifecycle state of a race.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceState {
    /// Counting down to the start; wagers accepted.
    Pre,
    /// Running.
    In,
    /// Decided; counting down before idling.
    Post,
}

impl RaceState {
    /// Short lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pre => "pre",
            Self::In => "in",
            Self::Post => "post",
        }
    }
}

impl std::fmt::Display for RaceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final order of one run, emitted when the race enters POST.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceOutcome {
    /// Race identifier.
    pub race_id: RaceId,
    /// Run number (1 for the first start).
    pub run: u64,
    /// Ticks the run took.
    pub ticks: u64,
    /// Slots in placement order.
    pub finish_order: Vec<Slot>,
    /// Final standings.
    pub standings: Vec<Competitor>,
}

impl RaceOutcome {
    /// Slot that placed first.
    #[must_use]
    pub fn winner(&self) -> Option<Slot> {
        self.finish_order.first().copied()
    }
}

/// Observable state of one race.
#[derive(Clone)]
pub struct RaceSignals {
    /// Lifecycle state.
    pub state: Signal<RaceState>,
    /// Current countdown value (pre or post).
    pub countdown: Signal<u32>,
    /// Roster snapshot in slot order.
    pub competitors: Signal<Vec<Competitor>>,
    /// True once the post countdown of the current run has elapsed.
    pub completed: Signal<bool>,
    /// Result of each run, when it enters POST.
    pub finished: EventStream<RaceOutcome>,
}

struct RaceInner {
    epoch: u64,
    run: u64,
    state: RaceState,
    roster: CompetitorRoster,
    generator: AdvanceGenerator,
    rng: ChaCha8Rng,
    ticker: Option<TimerHandle>,
    ticks: u64,
    completed: bool,
}

/// One race and its timers.
pub struct RaceInstance {
    id: RaceId,
    config: RaceConfig,
    scheduler: Scheduler,
    control: ReentrantMutex<()>,
    inner: Mutex<RaceInner>,
    pre_countdown: CountdownTimer,
    post_countdown: CountdownTimer,
    signals: RaceSignals,
    this: Weak<RaceInstance>,
}

impl RaceInstance {
    /// Creates an idle race in PRE with an empty roster.
    ///
    /// The config is expected to be validated; see [`RaceConfig::validate`].
    #[must_use]
    pub fn new(id: RaceId, config: RaceConfig, scheduler: Scheduler) -> Arc<Self> {
        let (generator, rng) = match config.seed {
            Some(seed) => {
                let seed = seed.wrapping_add(id.wrapping_mul(SEED_STRIDE));
                (
                    AdvanceGenerator::seeded(seed, config.alphabet, config.advance_mode),
                    ChaCha8Rng::seed_from_u64(seed.rotate_left(32)),
                )
            }
            None => (
                AdvanceGenerator::from_entropy(config.alphabet, config.advance_mode),
                ChaCha8Rng::from_entropy(),
            ),
        };

        let signals = RaceSignals {
            state: Signal::new(RaceState::Pre),
            countdown: Signal::new(config.pre_race_secs),
            competitors: Signal::new(Vec::new()),
            completed: Signal::new(false),
            finished: EventStream::new(),
        };

        Arc::new_cyclic(|this| Self {
            id,
            pre_countdown: CountdownTimer::new(scheduler.clone()),
            post_countdown: CountdownTimer::new(scheduler.clone()),
            scheduler,
            control: ReentrantMutex::new(()),
            inner: Mutex::new(RaceInner {
                epoch: 0,
                run: 0,
                state: RaceState::Pre,
                roster: CompetitorRoster::default(),
                generator,
                rng,
                ticker: None,
                ticks: 0,
                completed: false,
            }),
            config,
            signals,
            this: this.clone(),
        })
    }

    /// (Re)starts the race: fresh roster, PRE, pre-race countdown.
    ///
    /// Safe to call in any state; a running race is abandoned.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RaceError::CatalogTooSmall`] if a roster cannot be
    /// drawn. The previous run is stopped either way.
    pub fn start_race(&self) -> RaceResult<()> {
        let _control = self.control.lock();
        self.stop_race();

        let (epoch, run, competitors) = {
            let mut inner = self.inner.lock();
            let inner = &mut *inner;
            let roster = CompetitorRoster::draw(
                &self.config.catalog,
                self.config.competitor_count,
                &mut inner.rng,
            )?;
            inner.epoch += 1;
            inner.run += 1;
            inner.state = RaceState::Pre;
            inner.roster = roster;
            inner.ticks = 0;
            inner.completed = false;
            (inner.epoch, inner.run, inner.roster.by_slot().to_vec())
        };

        tracing::info!(
            race_id = self.id,
            run,
            pre_race_secs = self.config.pre_race_secs,
            "race started"
        );

        self.signals.completed.publish(false);
        self.signals.competitors.publish(competitors);
        self.signals.state.publish(RaceState::Pre);

        if !self.is_current(epoch) {
            return Ok(());
        }
        let this = self.this.clone();
        self.pre_countdown.start(
            self.config.pre_race_secs,
            move || {
                if let Some(race) = this.upgrade() {
                    race.begin_running(epoch);
                }
            },
            Some(self.signals.countdown.clone()),
        );
        Ok(())
    }

    /// Cancels the tick loop and both countdowns. Idempotent, any state.
    pub fn stop_race(&self) {
        let _control = self.control.lock();
        {
            let mut inner = self.inner.lock();
            inner.epoch += 1;
            if let Some(ticker) = inner.ticker.take() {
                ticker.cancel();
            }
        }
        self.pre_countdown.stop();
        self.post_countdown.stop();
    }

    /// PRE -> IN: start the tick loop.
    fn begin_running(&self, epoch: u64) {
        let _control = self.control.lock();
        {
            let mut inner = self.inner.lock();
            if inner.epoch != epoch || inner.state != RaceState::Pre {
                return;
            }
            inner.state = RaceState::In;

            let this = self.this.clone();
            let ticker = self.scheduler.schedule_repeating(self.config.tick_interval(), move || {
                if let Some(race) = this.upgrade() {
                    race.tick(epoch);
                }
            });
            inner.ticker = Some(ticker);
        }

        tracing::info!(race_id = self.id, "race running");
        self.signals.state.publish(RaceState::In);
    }

    /// One simulation step.
    fn tick(&self, epoch: u64) {
        let _control = self.control.lock();
        let (competitors, outcome) = {
            let mut inner = self.inner.lock();
            if inner.epoch != epoch || inner.state != RaceState::In {
                return;
            }
            let count = inner.roster.len();
            let advances = inner.generator.generate(self.config.advance_digits, count);
            let finished = inner
                .roster
                .apply_advances(&advances, self.config.winning_distance);
            inner.ticks += 1;

            tracing::debug!(
                race_id = self.id,
                tick = inner.ticks,
                finished,
                ?advances,
                "race tick"
            );

            let outcome = if finished == count {
                inner.state = RaceState::Post;
                if let Some(ticker) = inner.ticker.take() {
                    ticker.cancel();
                }
                Some(RaceOutcome {
                    race_id: self.id,
                    run: inner.run,
                    ticks: inner.ticks,
                    finish_order: inner.roster.finish_order(),
                    standings: inner.roster.by_placement(),
                })
            } else {
                None
            };
            (inner.roster.by_slot().to_vec(), outcome)
        };

        self.signals.competitors.publish(competitors);

        if let Some(outcome) = outcome {
            self.enter_post(epoch, &outcome);
        }
    }

    /// IN -> POST: publish the result and start the post countdown.
    fn enter_post(&self, epoch: u64, outcome: &RaceOutcome) {
        tracing::info!(
            race_id = self.id,
            run = outcome.run,
            ticks = outcome.ticks,
            winner = ?outcome.winner(),
            "race decided"
        );

        self.signals.state.publish(RaceState::Post);
        self.signals.finished.emit(outcome);

        if !self.is_current(epoch) {
            return;
        }
        let this = self.this.clone();
        self.post_countdown.start(
            self.config.post_race_secs,
            move || {
                if let Some(race) = this.upgrade() {
                    race.complete(epoch);
                }
            },
            Some(self.signals.countdown.clone()),
        );
    }

    /// Post countdown elapsed: stop everything and flag completion.
    fn complete(&self, epoch: u64) {
        let _control = self.control.lock();
        let newly_completed = {
            let mut inner = self.inner.lock();
            if inner.epoch != epoch {
                return;
            }
            if let Some(ticker) = inner.ticker.take() {
                ticker.cancel();
            }
            let newly = !inner.completed;
            inner.completed = true;
            newly
        };
        self.pre_countdown.stop();
        self.post_countdown.stop();

        if newly_completed {
            tracing::info!(race_id = self.id, "race completed");
            self.signals.completed.publish(true);
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.inner.lock().epoch == epoch
    }

    /// Race identifier.
    #[inline]
    #[must_use]
    pub fn id(&self) -> RaceId {
        self.id
    }

    /// Configuration of this instance.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RaceState {
        self.inner.lock().state
    }

    /// Current countdown value.
    #[must_use]
    pub fn countdown(&self) -> u32 {
        self.signals.countdown.get()
    }

    /// Competitors in slot order.
    #[must_use]
    pub fn competitors(&self) -> Vec<Competitor> {
        self.inner.lock().roster.by_slot().to_vec()
    }

    /// Competitors in standings order.
    #[must_use]
    pub fn standings(&self) -> Vec<Competitor> {
        self.inner.lock().roster.by_placement()
    }

    /// Winning distance.
    #[inline]
    #[must_use]
    pub fn winning_distance(&self) -> u64 {
        self.config.winning_distance
    }

    /// Number of times the race has been started.
    #[must_use]
    pub fn run(&self) -> u64 {
        self.inner.lock().run
    }

    /// Ticks executed in the current run.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.inner.lock().ticks
    }

    /// True once the current run's post countdown has elapsed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.inner.lock().completed
    }

    /// Returns true while any timer of this race is live.
    #[must_use]
    pub fn is_active(&self) -> bool {
        let ticking = self.inner.lock().ticker.is_some();
        ticking || self.pre_countdown.is_running() || self.post_countdown.is_running()
    }

    /// Observable streams of this race.
    #[inline]
    #[must_use]
    pub fn signals(&self) -> &RaceSignals {
        &self.signals
    }
}

impl std::fmt::Debug for RaceInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("RaceInstance")
            .field("id", &self.id)
            .field("state", &inner.state)
            .field("run", &inner.run)
            .field("ticks", &inner.ticks)
            .finish_non_exhaustive()
    }
}
