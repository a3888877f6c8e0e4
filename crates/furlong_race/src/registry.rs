//! # Race Registry
//!
//! Owns every race instance, keyed by id, and forwards control and queries
//! to them. The sorted id set is itself a signal so pools can appear as
//! races are created.

use crate::config::RaceConfig;
use crate::error::{RaceError, RaceResult};
use crate::instance::{RaceId, RaceInstance, RaceState};
use crate::roster::Competitor;
use furlong_core::{Scheduler, Signal};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Read access to race states, as needed by wager validation.
pub trait RaceStateSource: Send + Sync {
    /// Returns the current state of `race_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RaceError::RaceNotFound`] for unknown ids.
    fn race_state(&self, race_id: RaceId) -> RaceResult<RaceState>;

    /// Returns how many times `race_id` has been started.
    ///
    /// # Errors
    ///
    /// Returns [`RaceError::RaceNotFound`] for unknown ids.
    fn race_run(&self, race_id: RaceId) -> RaceResult<u64>;
}

/// Collection of races sharing one scheduler.
pub struct RaceRegistry {
    base: RaceConfig,
    scheduler: Scheduler,
    races: RwLock<HashMap<RaceId, Arc<RaceInstance>>>,
    race_ids: Signal<Vec<RaceId>>,
}

impl RaceRegistry {
    /// Creates an empty registry. `base` is the template for
    /// [`RaceRegistry::create_race`].
    #[must_use]
    pub fn new(base: RaceConfig, scheduler: Scheduler) -> Self {
        Self {
            base,
            scheduler,
            races: RwLock::new(HashMap::new()),
            race_ids: Signal::new(Vec::new()),
        }
    }

    /// Creates an idle race from the base config with its own pre-race
    /// countdown length.
    ///
    /// # Errors
    ///
    /// [`RaceError::DuplicateRace`] if the id exists, or a validation error.
    pub fn create_race(&self, race_id: RaceId, pre_race_secs: u32) -> RaceResult<Arc<RaceInstance>> {
        let config = RaceConfig {
            pre_race_secs,
            ..self.base.clone()
        };
        self.create_race_with(race_id, config)
    }

    /// Creates an idle race with an explicit config.
    ///
    /// # Errors
    ///
    /// [`RaceError::DuplicateRace`] if the id exists, or a validation error.
    pub fn create_race_with(&self, race_id: RaceId, config: RaceConfig) -> RaceResult<Arc<RaceInstance>> {
        config.validate()?;

        let (race, ids) = {
            let mut races = self.races.write();
            if races.contains_key(&race_id) {
                return Err(RaceError::DuplicateRace(race_id));
            }
            let race = RaceInstance::new(race_id, config, self.scheduler.clone());
            races.insert(race_id, Arc::clone(&race));
            (race, Self::sorted_ids(&races))
        };

        tracing::info!(race_id, "race created");
        self.race_ids.publish(ids);
        Ok(race)
    }

    fn sorted_ids(races: &HashMap<RaceId, Arc<RaceInstance>>) -> Vec<RaceId> {
        let mut ids: Vec<RaceId> = races.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Returns the race with `race_id`.
    ///
    /// # Errors
    ///
    /// [`RaceError::RaceNotFound`] for unknown ids.
    pub fn race(&self, race_id: RaceId) -> RaceResult<Arc<RaceInstance>> {
        self.races
            .read()
            .get(&race_id)
            .cloned()
            .ok_or(RaceError::RaceNotFound(race_id))
    }

    /// (Re)starts a race.
    ///
    /// # Errors
    ///
    /// [`RaceError::RaceNotFound`] for unknown ids, or a roster draw error.
    pub fn start_race(&self, race_id: RaceId) -> RaceResult<()> {
        self.race(race_id)?.start_race()
    }

    /// Stops a race's timers.
    ///
    /// # Errors
    ///
    /// [`RaceError::RaceNotFound`] for unknown ids.
    pub fn stop_race(&self, race_id: RaceId) -> RaceResult<()> {
        self.race(race_id)?.stop_race();
        Ok(())
    }

    /// Lifecycle state of a race.
    ///
    /// # Errors
    ///
    /// [`RaceError::RaceNotFound`] for unknown ids.
    pub fn race_state(&self, race_id: RaceId) -> RaceResult<RaceState> {
        Ok(self.race(race_id)?.state())
    }

    /// Run number of a race, 0 before its first start.
    ///
    /// # Errors
    ///
    /// [`RaceError::RaceNotFound`] for unknown ids.
    pub fn race_run(&self, race_id: RaceId) -> RaceResult<u64> {
        Ok(self.race(race_id)?.run())
    }

    /// Current countdown value of a race.
    ///
    /// # Errors
    ///
    /// [`RaceError::RaceNotFound`] for unknown ids.
    pub fn countdown(&self, race_id: RaceId) -> RaceResult<u32> {
        Ok(self.race(race_id)?.countdown())
    }

    /// Competitors of a race in slot order.
    ///
    /// # Errors
    ///
    /// [`RaceError::RaceNotFound`] for unknown ids.
    pub fn competitors(&self, race_id: RaceId) -> RaceResult<Vec<Competitor>> {
        Ok(self.race(race_id)?.competitors())
    }

    /// Winning distance of a race.
    ///
    /// # Errors
    ///
    /// [`RaceError::RaceNotFound`] for unknown ids.
    pub fn winning_distance(&self, race_id: RaceId) -> RaceResult<u64> {
        Ok(self.race(race_id)?.winning_distance())
    }

    /// Registered ids, ascending.
    #[must_use]
    pub fn ids(&self) -> Vec<RaceId> {
        self.race_ids.get()
    }

    /// Signal of the registered ids, ascending.
    #[inline]
    #[must_use]
    pub fn race_ids(&self) -> &Signal<Vec<RaceId>> {
        &self.race_ids
    }

    /// Number of races.
    #[must_use]
    pub fn len(&self) -> usize {
        self.races.read().len()
    }

    /// Returns true when no race exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.races.read().is_empty()
    }

    /// Shared scheduler.
    #[inline]
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Stops every race.
    pub fn stop_all(&self) {
        let races: Vec<Arc<RaceInstance>> = self.races.read().values().cloned().collect();
        for race in races {
            race.stop_race();
        }
    }
}

impl RaceStateSource for RaceRegistry {
    fn race_state(&self, race_id: RaceId) -> RaceResult<RaceState> {
        RaceRegistry::race_state(self, race_id)
    }

    fn race_run(&self, race_id: RaceId) -> RaceResult<u64> {
        RaceRegistry::race_run(self, race_id)
    }
}

impl Drop for RaceRegistry {
    fn drop(&mut self) {
        self.stop_all();
    }
}

impl std::fmt::Debug for RaceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaceRegistry")
            .field("races", &self.ids())
            .finish_non_exhaustive()
    }
}
