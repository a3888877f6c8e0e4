//! # Competitor Roster
//!
//! The fixed set of competitors of one race run.
//!
//! Membership and slots never change after the draw. Only positions and
//! placements mutate, and a placement once assigned is final.
//!
//! ## Finish Rule
//!
//! A competitor finishes on the tick its position reaches or passes the
//! winning distance. Competitors finishing on the same tick are ranked by
//! overshoot (larger first), then by their position before the tick (larger
//! first), then by slot.

use crate::error::{RaceError, RaceResult};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// Slot index of a competitor within its race (0..N-1).
pub type Slot = usize;

/// One runner in a race.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competitor {
    /// Stable identity within the race.
    pub slot: Slot,
    /// Display name.
    pub name: String,
    /// Current position on the track.
    pub position: u64,
    /// Position before the latest tick.
    pub previous_position: u64,
    /// Finish rank, 1-based. `None` until finished.
    pub placement: Option<u32>,
}

impl Competitor {
    /// Creates a competitor at the start line.
    #[must_use]
    pub fn new(slot: Slot, name: impl Into<String>) -> Self {
        Self {
            slot,
            name: name.into(),
            position: 0,
            previous_position: 0,
            placement: None,
        }
    }

    /// Returns true once a placement has been assigned.
    #[inline]
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.placement.is_some()
    }

    /// Distance past `winning_distance`, zero if short of it.
    #[inline]
    #[must_use]
    pub const fn overshoot(&self, winning_distance: u64) -> u64 {
        self.position.saturating_sub(winning_distance)
    }
}

/// Competitors of one race run, indexed by slot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompetitorRoster {
    competitors: Vec<Competitor>,
    finished: usize,
}

impl CompetitorRoster {
    /// Draws `count` distinct entries of `catalog` uniformly without
    /// replacement. Slots follow shuffle order.
    ///
    /// # Errors
    ///
    /// Returns [`RaceError::CatalogTooSmall`] if `count` exceeds the catalog.
    pub fn draw<R: Rng + ?Sized>(catalog: &[String], count: usize, rng: &mut R) -> RaceResult<Self> {
        if count > catalog.len() {
            return Err(RaceError::CatalogTooSmall {
                requested: count,
                available: catalog.len(),
            });
        }
        let mut shuffled: Vec<&String> = catalog.iter().collect();
        shuffled.shuffle(rng);
        Ok(Self::from_names(shuffled.into_iter().take(count).cloned()))
    }

    /// Builds a roster in the given order.
    #[must_use]
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let competitors = names
            .into_iter()
            .enumerate()
            .map(|(slot, name)| Competitor::new(slot, name))
            .collect();
        Self {
            competitors,
            finished: 0,
        }
    }

    /// Applies one tick of movement and returns how many competitors have
    /// finished after it.
    ///
    /// `advances[i]` moves slot `i`; missing entries move nothing. Finished
    /// competitors keep running out past the line, which never changes their
    /// placement.
    pub fn apply_advances(&mut self, advances: &[u64], winning_distance: u64) -> usize {
        for competitor in &mut self.competitors {
            let advance = advances.get(competitor.slot).copied().unwrap_or(0);
            competitor.previous_position = competitor.position;
            competitor.position = competitor.position.saturating_add(advance);
        }

        let mut arrivals: Vec<usize> = self
            .competitors
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_finished() && c.position >= winning_distance)
            .map(|(i, _)| i)
            .collect();

        // Stable: full ties stay in slot order.
        arrivals.sort_by_key(|&i| {
            let c = &self.competitors[i];
            (Reverse(c.overshoot(winning_distance)), Reverse(c.previous_position))
        });

        for index in arrivals {
            self.finished += 1;
            // Placements are bounded by the roster size, far below u32::MAX.
            #[allow(clippy::cast_possible_truncation)]
            let placement = self.finished as u32;
            self.competitors[index].placement = Some(placement);
        }

        self.finished
    }

    /// Competitors in slot order.
    #[inline]
    #[must_use]
    pub fn by_slot(&self) -> &[Competitor] {
        &self.competitors
    }

    /// Standings: finished competitors by placement, then the rest by
    /// position (descending), previous position (descending), slot.
    #[must_use]
    pub fn by_placement(&self) -> Vec<Competitor> {
        let mut standings = self.competitors.clone();
        standings.sort_by_key(|c| match c.placement {
            Some(placement) => (0, placement, Reverse(0), Reverse(0)),
            None => (1, 0, Reverse(c.position), Reverse(c.previous_position)),
        });
        standings
    }

    /// Slots of finished competitors in placement order.
    #[must_use]
    pub fn finish_order(&self) -> Vec<Slot> {
        let mut finished: Vec<&Competitor> =
            self.competitors.iter().filter(|c| c.is_finished()).collect();
        finished.sort_by_key(|c| c.placement);
        finished.into_iter().map(|c| c.slot).collect()
    }

    /// Returns the competitor in `slot`.
    #[must_use]
    pub fn get(&self, slot: Slot) -> Option<&Competitor> {
        self.competitors.get(slot)
    }

    /// Number of finished competitors.
    #[inline]
    #[must_use]
    pub const fn finished_count(&self) -> usize {
        self.finished
    }

    /// Number of competitors.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.competitors.len()
    }

    /// Returns true for a roster with no competitors.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.competitors.is_empty()
    }

    /// Returns true once every competitor has finished.
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.is_empty() && self.finished == self.competitors.len()
    }

    /// Sum of all positions.
    #[must_use]
    pub fn total_position(&self) -> u64 {
        self.competitors.iter().map(|c| c.position).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    fn four() -> CompetitorRoster {
        CompetitorRoster::from_names(["A", "B", "C", "D"])
    }

    #[test]
    fn test_single_finisher_scenario() {
        let mut roster = four();
        let finished = roster.apply_advances(&[2100, 500, 300, 100], 2000);

        assert_eq!(finished, 1);
        assert_eq!(roster.get(0).unwrap().placement, Some(1));
        assert!(roster.by_slot()[1..].iter().all(|c| c.placement.is_none()));
    }

    #[test]
    fn test_exact_distance_finishes() {
        let mut roster = four();
        assert_eq!(roster.apply_advances(&[2000, 1999, 0, 0], 2000), 1);
        assert_eq!(roster.get(0).unwrap().placement, Some(1));
        assert_eq!(roster.get(1).unwrap().placement, None);
    }

    #[test]
    fn test_simultaneous_finish_tie_breaks() {
        let mut roster = four();
        roster.apply_advances(&[1900, 1950, 1800, 1000], 2000);
        // Overshoots: A 50, B 50, C 250. A and B tie on overshoot, B was ahead.
        let finished = roster.apply_advances(&[150, 100, 450, 0], 2000);

        assert_eq!(finished, 3);
        assert_eq!(roster.get(2).unwrap().placement, Some(1));
        assert_eq!(roster.get(1).unwrap().placement, Some(2));
        assert_eq!(roster.get(0).unwrap().placement, Some(3));
        assert_eq!(roster.get(3).unwrap().placement, None);
    }

    #[test]
    fn test_full_tie_keeps_slot_order() {
        let mut roster = four();
        roster.apply_advances(&[2000, 2000, 0, 0], 2000);
        assert_eq!(roster.finish_order(), vec![0, 1]);
    }

    #[test]
    fn test_missing_advances_move_nothing() {
        let mut roster = four();
        roster.apply_advances(&[10, 20], 2000);
        let positions: Vec<u64> = roster.by_slot().iter().map(|c| c.position).collect();
        assert_eq!(positions, vec![10, 20, 0, 0]);

        roster.apply_advances(&[], 2000);
        assert_eq!(roster.total_position(), 30);
    }

    #[test]
    fn test_positions_sum_by_advances() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut roster = four();
        for _ in 0..200 {
            let advances: Vec<u64> = (0..4).map(|_| rng.gen_range(0..100)).collect();
            let before = roster.total_position();
            roster.apply_advances(&advances, 2000);
            assert_eq!(roster.total_position(), before + advances.iter().sum::<u64>());
        }
    }

    #[test]
    fn test_placements_form_permutation() {
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        let mut roster = four();
        while !roster.is_complete() {
            let advances: Vec<u64> = (0..4).map(|_| rng.gen_range(0..300)).collect();
            roster.apply_advances(&advances, 2000);
        }

        let mut placements: Vec<u32> = roster
            .by_slot()
            .iter()
            .map(|c| c.placement.unwrap())
            .collect();
        placements.sort_unstable();
        assert_eq!(placements, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_placement_never_changes() {
        let mut roster = four();
        roster.apply_advances(&[2500, 0, 0, 0], 2000);
        roster.apply_advances(&[0, 3000, 0, 0], 2000);
        assert_eq!(roster.get(0).unwrap().placement, Some(1));
        assert_eq!(roster.get(1).unwrap().placement, Some(2));
    }

    #[test]
    fn test_by_placement_ordering() {
        let mut roster = four();
        roster.apply_advances(&[100, 300, 300, 2200], 2000);
        roster.apply_advances(&[50, 10, 0, 0], 2000);

        let order: Vec<Slot> = roster.by_placement().iter().map(|c| c.slot).collect();
        // D finished; B (310) ahead of C (300); A last.
        assert_eq!(order, vec![3, 1, 2, 0]);
    }

    #[test]
    fn test_by_placement_breaks_position_ties_by_previous() {
        let mut roster = four();
        roster.apply_advances(&[100, 50, 0, 0], 2000);
        roster.apply_advances(&[0, 50, 0, 0], 2000);

        // A and B both at 100; A was at 100 before the tick, B at 50.
        let order: Vec<Slot> = roster.by_placement().iter().map(|c| c.slot).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_draw_without_replacement() {
        let catalog: Vec<String> = (0..12).map(|i| format!("runner-{i}")).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        for _ in 0..50 {
            let roster = CompetitorRoster::draw(&catalog, 4, &mut rng).unwrap();
            let names: HashSet<&str> = roster.by_slot().iter().map(|c| c.name.as_str()).collect();
            assert_eq!(names.len(), 4);
            let slots: Vec<Slot> = roster.by_slot().iter().map(|c| c.slot).collect();
            assert_eq!(slots, vec![0, 1, 2, 3]);
        }
    }

    #[test]
    fn test_draw_rejects_oversized_roster() {
        let catalog = vec!["only".to_string()];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(
            CompetitorRoster::draw(&catalog, 2, &mut rng),
            Err(RaceError::CatalogTooSmall {
                requested: 2,
                available: 1
            })
        );
    }
}
