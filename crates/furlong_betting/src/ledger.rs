//! # Wager Ledger
//!
//! Accepts wagers while their race is in PRE and records them in arrival
//! order. Accepted bets are published as the full list on
//! [`BetManager::bets`] and one by one on [`BetManager::accepted`], which is
//! what pools consume.
//!
//! Validation order is fixed: slot range, then stake, then race state, then
//! the race's running total. A bet that passes validation is always recorded.
//!
//! Placements are sequenced: validation, recording and publication of one
//! bet finish before the next begins, so the last published list is always
//! the full ledger and pools see bets in id order.

use crate::error::{WagerError, WagerResult};
use furlong_core::{EventStream, Signal};
use furlong_race::{RaceId, RaceState, RaceStateSource, Slot};
use parking_lot::{Mutex, ReentrantMutex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Bet identifier, ledger-scoped, starting at 1.
pub type BetId = u64;

/// An accepted wager. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bet {
    id: BetId,
    race_id: RaceId,
    run: u64,
    bettor: String,
    slot: Slot,
    amount: u64,
}

impl Bet {
    /// Creates a bet record.
    ///
    /// Only the ledger hands out ids; this is public for pools and tests
    /// that need records without a ledger.
    #[must_use]
    pub fn new(
        id: BetId,
        race_id: RaceId,
        run: u64,
        bettor: impl Into<String>,
        slot: Slot,
        amount: u64,
    ) -> Self {
        Self {
            id,
            race_id,
            run,
            bettor: bettor.into(),
            slot,
            amount,
        }
    }

    /// Bet identifier.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> BetId {
        self.id
    }

    /// Race the bet is on.
    #[inline]
    #[must_use]
    pub const fn race_id(&self) -> RaceId {
        self.race_id
    }

    /// Run of the race the bet was placed in.
    #[inline]
    #[must_use]
    pub const fn run(&self) -> u64 {
        self.run
    }

    /// Who placed the bet.
    #[inline]
    #[must_use]
    pub fn bettor(&self) -> &str {
        &self.bettor
    }

    /// Outcome slot backed.
    #[inline]
    #[must_use]
    pub const fn slot(&self) -> Slot {
        self.slot
    }

    /// Stake in token units.
    #[inline]
    #[must_use]
    pub const fn amount(&self) -> u64 {
        self.amount
    }
}

struct Ledger {
    next_id: BetId,
    bets: Vec<Bet>,
    /// Stake accepted per race, across runs.
    totals: HashMap<RaceId, u64>,
}

/// Wager ledger.
pub struct BetManager {
    races: Arc<dyn RaceStateSource>,
    competitors: usize,
    /// Held from validation through publication of one bet.
    sequence: ReentrantMutex<()>,
    ledger: Mutex<Ledger>,
    bets: Signal<Vec<Bet>>,
    accepted: EventStream<Bet>,
}

impl BetManager {
    /// Creates an empty ledger validating against `races`, for races of
    /// `competitors` runners.
    #[must_use]
    pub fn new(races: Arc<dyn RaceStateSource>, competitors: usize) -> Self {
        Self {
            races,
            competitors,
            sequence: ReentrantMutex::new(()),
            ledger: Mutex::new(Ledger {
                next_id: 1,
                bets: Vec::new(),
                totals: HashMap::new(),
            }),
            bets: Signal::new(Vec::new()),
            accepted: EventStream::new(),
        }
    }

    /// Validates and records a wager.
    ///
    /// # Errors
    ///
    /// - [`WagerError::InvalidOutcome`] if `slot` is out of range
    /// - [`WagerError::InvalidStake`] if `amount` is zero
    /// - [`WagerError::Race`] if the race is unknown
    /// - [`WagerError::RaceNotAcceptingWagers`] unless the race is in PRE
    /// - [`WagerError::StakeOverflow`] if the race's total would overflow
    pub fn generate_bet(
        &self,
        race_id: RaceId,
        bettor: &str,
        slot: Slot,
        amount: u64,
    ) -> WagerResult<Bet> {
        if slot >= self.competitors {
            return Err(WagerError::InvalidOutcome {
                slot,
                competitors: self.competitors,
            });
        }
        if amount == 0 {
            return Err(WagerError::InvalidStake);
        }

        let _sequence = self.sequence.lock();

        let state = self.races.race_state(race_id)?;
        if state != RaceState::Pre {
            return Err(WagerError::RaceNotAcceptingWagers { race_id, state });
        }
        let run = self.races.race_run(race_id)?;

        let (bet, snapshot) = {
            let mut guard = self.ledger.lock();
            let ledger = &mut *guard;
            let total = ledger.totals.entry(race_id).or_insert(0);
            *total = total
                .checked_add(amount)
                .ok_or(WagerError::StakeOverflow { race_id, amount })?;

            let bet = Bet::new(ledger.next_id, race_id, run, bettor, slot, amount);
            ledger.next_id += 1;
            ledger.bets.push(bet.clone());
            (bet, ledger.bets.clone())
        };

        tracing::debug!(
            bet_id = bet.id,
            race_id,
            run,
            bettor,
            slot,
            amount,
            "bet accepted"
        );

        self.bets.publish(snapshot);
        self.accepted.emit(&bet);
        Ok(bet)
    }

    /// Every accepted bet, in acceptance order.
    #[must_use]
    pub fn all_bets(&self) -> Vec<Bet> {
        self.ledger.lock().bets.clone()
    }

    /// Accepted bets for one race, in acceptance order.
    #[must_use]
    pub fn bets_for(&self, race_id: RaceId) -> Vec<Bet> {
        self.ledger
            .lock()
            .bets
            .iter()
            .filter(|bet| bet.race_id == race_id)
            .cloned()
            .collect()
    }

    /// Stake accepted for one race across all of its runs.
    #[must_use]
    pub fn total_for(&self, race_id: RaceId) -> u64 {
        self.ledger
            .lock()
            .totals
            .get(&race_id)
            .copied()
            .unwrap_or(0)
    }

    /// Number of accepted bets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ledger.lock().bets.len()
    }

    /// Returns true when no bet has been accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ledger.lock().bets.is_empty()
    }

    /// Competitors per race, the exclusive upper bound of valid slots.
    #[inline]
    #[must_use]
    pub fn competitors(&self) -> usize {
        self.competitors
    }

    /// Full bet list, republished after every acceptance.
    #[inline]
    #[must_use]
    pub fn bets(&self) -> &Signal<Vec<Bet>> {
        &self.bets
    }

    /// Each newly accepted bet.
    #[inline]
    #[must_use]
    pub fn accepted(&self) -> &EventStream<Bet> {
        &self.accepted
    }
}

impl std::fmt::Debug for BetManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BetManager")
            .field("competitors", &self.competitors)
            .field("bets", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use furlong_race::RaceError;

    /// Races with fixed states, each on run 1 unless set otherwise.
    #[derive(Default)]
    struct FixedStates {
        states: Mutex<HashMap<RaceId, (RaceState, u64)>>,
    }

    impl FixedStates {
        fn set(&self, race_id: RaceId, state: RaceState) {
            self.set_run(race_id, state, 1);
        }

        fn set_run(&self, race_id: RaceId, state: RaceState, run: u64) {
            self.states.lock().insert(race_id, (state, run));
        }

        fn lookup(&self, race_id: RaceId) -> furlong_race::RaceResult<(RaceState, u64)> {
            self.states
                .lock()
                .get(&race_id)
                .copied()
                .ok_or(RaceError::RaceNotFound(race_id))
        }
    }

    impl RaceStateSource for FixedStates {
        fn race_state(&self, race_id: RaceId) -> furlong_race::RaceResult<RaceState> {
            Ok(self.lookup(race_id)?.0)
        }

        fn race_run(&self, race_id: RaceId) -> furlong_race::RaceResult<u64> {
            Ok(self.lookup(race_id)?.1)
        }
    }

    fn ledger() -> (BetManager, Arc<FixedStates>) {
        let states = Arc::new(FixedStates::default());
        states.set(1, RaceState::Pre);
        states.set(2, RaceState::In);
        states.set(3, RaceState::Post);
        (BetManager::new(states.clone(), 4), states)
    }

    #[test]
    fn test_ids_are_sequential_from_one() {
        let (ledger, _) = ledger();
        let a = ledger.generate_bet(1, "alice", 0, 100).unwrap();
        let b = ledger.generate_bet(1, "bob", 3, 50).unwrap();

        assert_eq!(a.id(), 1);
        assert_eq!(b.id(), 2);
        assert_eq!(b.bettor(), "bob");
        assert_eq!(b.slot(), 3);
        assert_eq!(b.amount(), 50);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_rejects_out_of_range_slot() {
        let (ledger, _) = ledger();
        assert_eq!(
            ledger.generate_bet(1, "alice", 4, 100),
            Err(WagerError::InvalidOutcome {
                slot: 4,
                competitors: 4
            })
        );
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_rejects_zero_stake() {
        let (ledger, _) = ledger();
        assert_eq!(ledger.generate_bet(1, "alice", 0, 0), Err(WagerError::InvalidStake));
    }

    #[test]
    fn test_rejects_closed_races() {
        let (ledger, _) = ledger();
        assert_eq!(
            ledger.generate_bet(2, "alice", 0, 10),
            Err(WagerError::RaceNotAcceptingWagers {
                race_id: 2,
                state: RaceState::In
            })
        );
        assert_eq!(
            ledger.generate_bet(3, "alice", 0, 10),
            Err(WagerError::RaceNotAcceptingWagers {
                race_id: 3,
                state: RaceState::Post
            })
        );
        assert!(ledger.is_empty());
        assert!(ledger.bets().get().is_empty());
    }

    #[test]
    fn test_unknown_race_is_race_error() {
        let (ledger, _) = ledger();
        assert_eq!(
            ledger.generate_bet(99, "alice", 0, 10),
            Err(WagerError::Race(RaceError::RaceNotFound(99)))
        );
    }

    #[test]
    fn test_validation_order() {
        let (ledger, _) = ledger();
        // Bad slot wins over bad stake and closed race.
        assert!(matches!(
            ledger.generate_bet(2, "alice", 9, 0),
            Err(WagerError::InvalidOutcome { .. })
        ));
        // Bad stake wins over closed race.
        assert_eq!(ledger.generate_bet(2, "alice", 0, 0), Err(WagerError::InvalidStake));
    }

    #[test]
    fn test_state_is_read_at_placement() {
        let (ledger, states) = ledger();
        ledger.generate_bet(1, "alice", 0, 10).unwrap();
        states.set(1, RaceState::In);
        assert!(ledger.generate_bet(1, "alice", 0, 10).is_err());
        states.set(1, RaceState::Pre);
        assert_eq!(ledger.generate_bet(1, "alice", 0, 10).unwrap().id(), 2);
    }

    #[test]
    fn test_publishes_list_and_accepted() {
        let (ledger, states) = ledger();
        states.set(5, RaceState::Pre);
        let lists = ledger.bets().subscribe_channel(8);
        let accepted = ledger.accepted().subscribe_channel(8);

        ledger.generate_bet(1, "alice", 0, 10).unwrap();
        ledger.generate_bet(5, "bob", 1, 20).unwrap();
        let _ = ledger.generate_bet(2, "carol", 1, 20);

        let lists = lists.drain();
        assert_eq!(lists.len(), 3);
        assert!(lists[0].is_empty());
        assert_eq!(lists[2].len(), 2);

        let ids: Vec<BetId> = accepted.drain().iter().map(Bet::id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(ledger.bets_for(5).len(), 1);
    }

    #[test]
    fn test_bets_carry_the_race_run() {
        let (ledger, states) = ledger();
        assert_eq!(ledger.generate_bet(1, "alice", 0, 10).unwrap().run(), 1);

        states.set_run(1, RaceState::Pre, 2);
        let bet = ledger.generate_bet(1, "bob", 1, 10).unwrap();
        assert_eq!(bet.run(), 2);
        assert_eq!(ledger.total_for(1), 20);
    }

    #[test]
    fn test_total_overflow_rejected() {
        let (ledger, states) = ledger();
        states.set(4, RaceState::Pre);
        ledger.generate_bet(4, "alice", 0, u64::MAX).unwrap();

        assert_eq!(
            ledger.generate_bet(4, "bob", 1, 1),
            Err(WagerError::StakeOverflow {
                race_id: 4,
                amount: 1
            })
        );
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.total_for(4), u64::MAX);
        assert_eq!(ledger.bets().get().len(), 1);

        // Other races keep their own totals.
        assert!(ledger.generate_bet(1, "bob", 1, 1).is_ok());
    }

    #[test]
    fn test_concurrent_bets_publish_full_ledger() {
        let (ledger, _) = ledger();
        let ledger = Arc::new(ledger);
        let last_seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&last_seen);
        let _sub = ledger
            .accepted()
            .subscribe(move |bet: &Bet| recorder.lock().push(bet.id()));

        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        ledger
                            .generate_bet(1, &format!("bettor-{worker}"), i % 4, 1)
                            .unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(ledger.len(), 200);
        assert_eq!(ledger.bets().get(), ledger.all_bets());
        let emitted = last_seen.lock().clone();
        assert_eq!(emitted, (1..=200).collect::<Vec<BetId>>());
    }
}
