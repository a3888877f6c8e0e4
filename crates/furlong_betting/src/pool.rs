//! # Pari-Mutuel Pools
//!
//! One [`Pool`] per race aggregates its wagers and keeps a live odds vector.
//!
//! ## Odds
//!
//! For each outcome slot with stake `s` in a pool of total `T`:
//!
//! ```text
//! odds = (T - s) / s     if s > 0
//! odds = 0               if s == 0
//! ```
//!
//! ## Lifecycle
//!
//! [`PoolManager`] creates a pool the first time it sees a race id and never
//! recreates it. Restarting a race therefore keeps adding to the same pool:
//! totals and odds are cumulative. Settlement is not; [`Pool::payouts`]
//! splits only the stakes of the run being settled.

use crate::ledger::{Bet, BetId};
use furlong_core::{EventStream, Signal, Subscription};
use furlong_race::{RaceId, Slot};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Computes the odds vector for per-slot stakes summing to `total`.
#[must_use]
pub fn compute_odds(stake_per_slot: &[u64], total: u64) -> Vec<f64> {
    stake_per_slot
        .iter()
        .map(|&stake| {
            if stake == 0 {
                0.0
            } else {
                // Stakes stay far below 2^53 in practice.
                #[allow(clippy::cast_precision_loss)]
                let odds = total.saturating_sub(stake) as f64 / stake as f64;
                odds
            }
        })
        .collect()
}

/// What one winning bet returns, stake included.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    /// Winning bet.
    pub bet_id: BetId,
    /// Who placed it.
    pub bettor: String,
    /// Stake placed.
    pub stake: u64,
    /// Amount returned, `floor(stake * run_total / run_stake_on_slot)`.
    pub amount: u64,
}

/// Observable pool state.
#[derive(Clone)]
pub struct PoolSignals {
    /// Bets in acceptance order.
    pub bets: Signal<Vec<Bet>>,
    /// Running total stake.
    pub total: Signal<u64>,
    /// Odds per outcome slot.
    pub odds: Signal<Vec<f64>>,
}

struct PoolBook {
    bets: Vec<Bet>,
    total: u64,
    stake_per_slot: Vec<u64>,
    odds: Vec<f64>,
}

/// Pari-mutuel pool of one race.
pub struct Pool {
    race_id: RaceId,
    /// Held from a book update through its publication.
    sequence: ReentrantMutex<()>,
    book: Mutex<PoolBook>,
    signals: PoolSignals,
}

impl Pool {
    /// Creates an empty pool over `outcomes` slots.
    #[must_use]
    pub fn new(race_id: RaceId, outcomes: usize) -> Self {
        Self {
            race_id,
            sequence: ReentrantMutex::new(()),
            book: Mutex::new(PoolBook {
                bets: Vec::new(),
                total: 0,
                stake_per_slot: vec![0; outcomes],
                odds: vec![0.0; outcomes],
            }),
            signals: PoolSignals {
                bets: Signal::new(Vec::new()),
                total: Signal::new(0),
                odds: Signal::new(vec![0.0; outcomes]),
            },
        }
    }

    /// Adds a bet and recomputes the odds. Returns false, changing nothing,
    /// for bets on another race, on a slot this pool does not have, or whose
    /// stake would overflow the total.
    pub fn add_bet(&self, bet: &Bet) -> bool {
        if bet.race_id() != self.race_id {
            return false;
        }

        let _sequence = self.sequence.lock();
        let (bets, total, odds) = {
            let mut guard = self.book.lock();
            let book = &mut *guard;
            let Some(&on_slot) = book.stake_per_slot.get(bet.slot()) else {
                tracing::debug!(
                    race_id = self.race_id,
                    slot = bet.slot(),
                    "bet slot outside pool, ignored"
                );
                return false;
            };
            // The slot stake never exceeds the total, so one check covers both.
            let Some(total) = book.total.checked_add(bet.amount()) else {
                tracing::warn!(
                    race_id = self.race_id,
                    bet_id = bet.id(),
                    amount = bet.amount(),
                    "stake would overflow pool total, ignored"
                );
                return false;
            };
            book.stake_per_slot[bet.slot()] = on_slot + bet.amount();
            book.total = total;
            book.bets.push(bet.clone());
            book.odds = compute_odds(&book.stake_per_slot, book.total);
            (book.bets.clone(), book.total, book.odds.clone())
        };

        tracing::debug!(race_id = self.race_id, total, ?odds, "pool updated");

        self.signals.bets.publish(bets);
        self.signals.total.publish(total);
        self.signals.odds.publish(odds);
        true
    }

    /// Returns each winning bet's payout if `winning_slot` wins `run`.
    ///
    /// Only bets placed during `run` share in it, so a run is never paid
    /// from, or paid again by, another run's stakes. Empty when nothing of
    /// that run was staked on the winner.
    #[must_use]
    pub fn payouts(&self, winning_slot: Slot, run: u64) -> Vec<Payout> {
        let book = self.book.lock();
        let in_run: Vec<&Bet> = book.bets.iter().filter(|bet| bet.run() == run).collect();

        let run_total: u128 = in_run.iter().map(|bet| u128::from(bet.amount())).sum();
        let winners: Vec<&Bet> = in_run
            .into_iter()
            .filter(|bet| bet.slot() == winning_slot)
            .collect();
        let on_slot: u128 = winners.iter().map(|bet| u128::from(bet.amount())).sum();
        if on_slot == 0 {
            return Vec::new();
        }

        winners
            .into_iter()
            .map(|bet| {
                let amount = u128::from(bet.amount()) * run_total / on_slot;
                Payout {
                    bet_id: bet.id(),
                    bettor: bet.bettor().to_string(),
                    stake: bet.amount(),
                    amount: u64::try_from(amount).unwrap_or(u64::MAX),
                }
            })
            .collect()
    }

    /// Race this pool belongs to.
    #[inline]
    #[must_use]
    pub fn race_id(&self) -> RaceId {
        self.race_id
    }

    /// Bets in acceptance order.
    #[must_use]
    pub fn bets(&self) -> Vec<Bet> {
        self.book.lock().bets.clone()
    }

    /// Total stake.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.book.lock().total
    }

    /// Stake per outcome slot.
    #[must_use]
    pub fn stake_per_slot(&self) -> Vec<u64> {
        self.book.lock().stake_per_slot.clone()
    }

    /// Odds per outcome slot.
    #[must_use]
    pub fn odds(&self) -> Vec<f64> {
        self.book.lock().odds.clone()
    }

    /// Observable streams of this pool.
    #[inline]
    #[must_use]
    pub fn signals(&self) -> &PoolSignals {
        &self.signals
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let book = self.book.lock();
        f.debug_struct("Pool")
            .field("race_id", &self.race_id)
            .field("total", &book.total)
            .field("odds", &book.odds)
            .finish_non_exhaustive()
    }
}

/// Keeps one pool per known race and routes accepted bets to them.
pub struct PoolManager {
    outcomes: usize,
    pools: RwLock<HashMap<RaceId, Arc<Pool>>>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl PoolManager {
    /// Creates a manager with no pools and no upstream.
    #[must_use]
    pub fn new(outcomes: usize) -> Self {
        Self {
            outcomes,
            pools: RwLock::new(HashMap::new()),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Creates a manager fed by a race-id signal and an accepted-bet stream.
    ///
    /// Ids already published are picked up immediately.
    #[must_use]
    pub fn attach(outcomes: usize, race_ids: &Signal<Vec<RaceId>>, accepted: &EventStream<Bet>) -> Arc<Self> {
        let manager = Arc::new(Self::new(outcomes));

        let weak: Weak<Self> = Arc::downgrade(&manager);
        let ids_sub = race_ids.subscribe(move |ids| {
            if let Some(manager) = weak.upgrade() {
                manager.observe_races(ids);
            }
        });

        let weak: Weak<Self> = Arc::downgrade(&manager);
        let bets_sub = accepted.subscribe(move |bet| {
            if let Some(manager) = weak.upgrade() {
                manager.route(bet);
            }
        });

        manager.subscriptions.lock().extend([ids_sub, bets_sub]);
        manager
    }

    /// Creates pools for ids not seen before.
    pub fn observe_races(&self, ids: &[RaceId]) {
        for &race_id in ids {
            self.ensure_pool(race_id);
        }
    }

    /// Returns the pool of `race_id`, creating it on first sight.
    pub fn ensure_pool(&self, race_id: RaceId) -> Arc<Pool> {
        if let Some(pool) = self.pools.read().get(&race_id) {
            return Arc::clone(pool);
        }
        let mut pools = self.pools.write();
        Arc::clone(pools.entry(race_id).or_insert_with(|| {
            tracing::debug!(race_id, "pool created");
            Arc::new(Pool::new(race_id, self.outcomes))
        }))
    }

    /// Adds `bet` to its race's pool. Returns false when no pool exists.
    pub fn route(&self, bet: &Bet) -> bool {
        let pool = self.pools.read().get(&bet.race_id()).cloned();
        match pool {
            Some(pool) => pool.add_bet(bet),
            None => {
                tracing::debug!(
                    race_id = bet.race_id(),
                    bet_id = bet.id(),
                    "no pool for bet, dropped"
                );
                false
            }
        }
    }

    /// Pool of `race_id`, if known.
    #[must_use]
    pub fn pool(&self, race_id: RaceId) -> Option<Arc<Pool>> {
        self.pools.read().get(&race_id).cloned()
    }

    /// Known race ids, ascending.
    #[must_use]
    pub fn race_ids(&self) -> Vec<RaceId> {
        let mut ids: Vec<RaceId> = self.pools.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Stops listening to upstream streams. Existing pools stay readable.
    pub fn detach(&self) {
        self.subscriptions.lock().clear();
    }
}

impl std::fmt::Debug for PoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolManager")
            .field("outcomes", &self.outcomes)
            .field("races", &self.race_ids())
            .finish_non_exhaustive()
    }
}
