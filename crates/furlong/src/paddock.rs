//! # Paddock
//!
//! One object holding the race registry, the wager ledger and the pools,
//! wired so that every accepted bet reaches its race's pool and every new
//! race gets a pool before its first bet.

use furlong_betting::{Bet, BetManager, Payout, Pool, PoolManager, WagerResult};
use furlong_core::Scheduler;
use furlong_race::{RaceConfig, RaceId, RaceInstance, RaceRegistry, RaceResult, RaceState, RaceStateSource, Slot};
use std::sync::Arc;

/// Registry, ledger and pools of one process.
pub struct Paddock {
    registry: Arc<RaceRegistry>,
    ledger: BetManager,
    pools: Arc<PoolManager>,
}

impl Paddock {
    /// Builds an empty paddock. Races created later use `config` as their
    /// template.
    #[must_use]
    pub fn new(config: RaceConfig, scheduler: Scheduler) -> Self {
        let competitors = config.competitor_count;
        let registry = Arc::new(RaceRegistry::new(config, scheduler));
        let source: Arc<dyn RaceStateSource> = registry.clone();
        let ledger = BetManager::new(source, competitors);
        let pools = PoolManager::attach(competitors, registry.race_ids(), ledger.accepted());

        Self {
            registry,
            ledger,
            pools,
        }
    }

    /// Creates an idle race.
    ///
    /// # Errors
    ///
    /// As [`RaceRegistry::create_race`].
    pub fn create_race(&self, race_id: RaceId, pre_race_secs: u32) -> RaceResult<Arc<RaceInstance>> {
        self.registry.create_race(race_id, pre_race_secs)
    }

    /// (Re)starts a race.
    ///
    /// # Errors
    ///
    /// As [`RaceRegistry::start_race`].
    pub fn start_race(&self, race_id: RaceId) -> RaceResult<()> {
        self.registry.start_race(race_id)
    }

    /// Stops a race.
    ///
    /// # Errors
    ///
    /// As [`RaceRegistry::stop_race`].
    pub fn stop_race(&self, race_id: RaceId) -> RaceResult<()> {
        self.registry.stop_race(race_id)
    }

    /// Places a wager. Rejections are logged.
    ///
    /// # Errors
    ///
    /// As [`BetManager::generate_bet`].
    pub fn place_bet(&self, race_id: RaceId, bettor: &str, slot: Slot, amount: u64) -> WagerResult<Bet> {
        self.ledger
            .generate_bet(race_id, bettor, slot, amount)
            .map_err(|e| {
                tracing::warn!(race_id, bettor, slot, amount, error = %e, "wager rejected");
                e
            })
    }

    /// Pool of a race.
    #[must_use]
    pub fn pool(&self, race_id: RaceId) -> Option<Arc<Pool>> {
        self.pools.pool(race_id)
    }

    /// Winner of a decided race.
    ///
    /// `None` unless the race is in POST.
    ///
    /// # Errors
    ///
    /// [`furlong_race::RaceError::RaceNotFound`] for unknown ids.
    pub fn winner(&self, race_id: RaceId) -> RaceResult<Option<Slot>> {
        let race = self.registry.race(race_id)?;
        Ok(Self::decided_winner(&race))
    }

    fn decided_winner(race: &RaceInstance) -> Option<Slot> {
        if race.state() != RaceState::Post {
            return None;
        }
        race.standings()
            .first()
            .filter(|c| c.placement == Some(1))
            .map(|c| c.slot)
    }

    /// Payouts of the decided run of a race.
    ///
    /// Only bets placed during that run are paid. `None` while the race is
    /// undecided or has no pool.
    ///
    /// # Errors
    ///
    /// [`furlong_race::RaceError::RaceNotFound`] for unknown ids.
    pub fn settle(&self, race_id: RaceId) -> RaceResult<Option<Vec<Payout>>> {
        let race = self.registry.race(race_id)?;
        let Some(winner) = Self::decided_winner(&race) else {
            return Ok(None);
        };
        let run = race.run();
        Ok(self.pool(race_id).map(|pool| pool.payouts(winner, run)))
    }

    /// Stops every race and detaches the pools.
    pub fn shutdown(&self) {
        self.registry.stop_all();
        self.pools.detach();
        tracing::info!(bets = self.ledger.len(), "paddock shut down");
    }

    /// Race registry.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &RaceRegistry {
        &self.registry
    }

    /// Wager ledger.
    #[inline]
    #[must_use]
    pub fn ledger(&self) -> &BetManager {
        &self.ledger
    }

    /// Pool manager.
    #[inline]
    #[must_use]
    pub fn pools(&self) -> &PoolManager {
        &self.pools
    }

    /// Shared scheduler.
    #[inline]
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        self.registry.scheduler()
    }
}

impl std::fmt::Debug for Paddock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Paddock")
            .field("races", &self.registry.ids())
            .field("bets", &self.ledger.len())
            .finish_non_exhaustive()
    }
}
