//! Lineup stint tracking.
//!
//! A stint is the interval during which one fixed five-player set is on the
//! floor. Stints for a game are contiguous and non-overlapping with at most
//! one open at any time. The tracker is plain owned state: the engine clones
//! it, applies an event, and swaps the clone in only after the persistence
//! commit succeeds.

use std::collections::HashMap;

use crate::domain::{GameId, Lineup, LineupStintRow, PlayerId};
use crate::error::StintError;

#[derive(Debug, Clone)]
pub struct LineupStintTracker {
    game_id: GameId,
    /// All stints in open order; at most the last one is open.
    stints: Vec<LineupStintRow>,
}

impl LineupStintTracker {
    pub fn new(game_id: GameId) -> Self {
        Self {
            game_id,
            stints: Vec::new(),
        }
    }

    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// The lineup currently on the floor, if a stint is open.
    pub fn current_lineup(&self) -> Option<&Lineup> {
        self.open_stint().map(|s| &s.lineup)
    }

    pub fn open_stint(&self) -> Option<&LineupStintRow> {
        self.stints.last().filter(|s| s.is_open())
    }

    pub fn stints(&self) -> &[LineupStintRow] {
        &self.stints
    }

    /// Register the lineup on the floor at `time_secs`.
    ///
    /// If it differs from the current lineup (set equality), the open stint
    /// closes at `time_secs` and a new one opens. Returns the stint rows that
    /// changed, in close-then-open order, for the commit batch. A repeat of
    /// the current lineup changes nothing.
    pub fn observe_lineup(
        &mut self,
        time_secs: u32,
        lineup: Lineup,
    ) -> Result<Vec<LineupStintRow>, StintError> {
        if self.current_lineup() == Some(&lineup) {
            return Ok(Vec::new());
        }

        let mut dirty = Vec::new();
        if let Some(closed) = self.close_open(time_secs)? {
            dirty.push(closed);
        }

        let stint_no = self.stints.len() as i32 + 1;
        let opened = LineupStintRow {
            game_id: self.game_id,
            stint_no,
            lineup,
            start_time_seconds: time_secs,
            end_time_seconds: None,
            duration_seconds: None,
            points_for: 0,
            points_against: 0,
        };
        self.stints.push(opened.clone());
        dirty.push(opened);
        Ok(dirty)
    }

    /// Add points to the open stint, for or against.
    pub fn record_score(
        &mut self,
        points: i32,
        for_team: bool,
    ) -> Result<LineupStintRow, StintError> {
        let open = self
            .stints
            .last_mut()
            .filter(|s| s.is_open())
            .ok_or(StintError::NoOpenStint)?;
        if for_team {
            open.points_for += points;
        } else {
            open.points_against += points;
        }
        Ok(open.clone())
    }

    /// Close the open stint at game end. Returns the closed row, or None if
    /// no stint was open.
    pub fn close_game(&mut self, time_secs: u32) -> Result<Option<LineupStintRow>, StintError> {
        self.close_open(time_secs)
    }

    /// Seconds each player spent on the floor, summed over closed stints.
    pub fn player_seconds(&self) -> HashMap<PlayerId, u32> {
        let mut totals: HashMap<PlayerId, u32> = HashMap::new();
        for stint in &self.stints {
            let Some(duration) = stint.duration_seconds else {
                continue;
            };
            for player in stint.lineup.players() {
                *totals.entry(player).or_insert(0) += duration;
            }
        }
        totals
    }

    /// Sum of (points_for, points_against) over closed stints.
    pub fn score_totals(&self) -> (i32, i32) {
        self.stints
            .iter()
            .filter(|s| !s.is_open())
            .fold((0, 0), |(pf, pa), s| {
                (pf + s.points_for, pa + s.points_against)
            })
    }

    fn close_open(&mut self, time_secs: u32) -> Result<Option<LineupStintRow>, StintError> {
        let Some(open) = self.stints.last_mut().filter(|s| s.is_open()) else {
            return Ok(None);
        };
        if time_secs < open.start_time_seconds {
            return Err(StintError::NegativeDuration {
                start_secs: open.start_time_seconds,
                close_secs: time_secs,
            });
        }
        open.end_time_seconds = Some(time_secs);
        open.duration_seconds = Some(time_secs - open.start_time_seconds);
        Ok(Some(open.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lineup(ids: [PlayerId; 5]) -> Lineup {
        Lineup::new(ids).unwrap()
    }

    #[test]
    fn test_substitution_closes_and_opens() {
        let mut tracker = LineupStintTracker::new(1);
        tracker.observe_lineup(0, lineup([1, 2, 3, 4, 5])).unwrap();
        tracker.record_score(10, true).unwrap();
        tracker.record_score(8, false).unwrap();

        let dirty = tracker.observe_lineup(300, lineup([1, 2, 3, 4, 6])).unwrap();
        assert_eq!(dirty.len(), 2);

        let closed = &dirty[0];
        assert_eq!(closed.stint_no, 1);
        assert_eq!(closed.lineup, lineup([1, 2, 3, 4, 5]));
        assert_eq!(closed.start_time_seconds, 0);
        assert_eq!(closed.end_time_seconds, Some(300));
        assert_eq!(closed.duration_seconds, Some(300));
        assert_eq!(closed.points_for, 10);
        assert_eq!(closed.points_against, 8);

        let opened = &dirty[1];
        assert_eq!(opened.stint_no, 2);
        assert_eq!(opened.lineup, lineup([1, 2, 3, 4, 6]));
        assert_eq!(opened.start_time_seconds, 300);
        assert!(opened.is_open());
    }

    #[test]
    fn test_same_lineup_is_noop() {
        let mut tracker = LineupStintTracker::new(1);
        tracker.observe_lineup(0, lineup([1, 2, 3, 4, 5])).unwrap();
        let dirty = tracker.observe_lineup(120, lineup([5, 4, 3, 2, 1])).unwrap();
        assert!(dirty.is_empty());
        assert_eq!(tracker.stints().len(), 1);
    }

    #[test]
    fn test_score_before_lineup_fails() {
        let mut tracker = LineupStintTracker::new(1);
        assert!(matches!(
            tracker.record_score(2, true),
            Err(StintError::NoOpenStint)
        ));
    }

    #[test]
    fn test_negative_duration_fails() {
        let mut tracker = LineupStintTracker::new(1);
        tracker.observe_lineup(300, lineup([1, 2, 3, 4, 5])).unwrap();
        assert!(matches!(
            tracker.observe_lineup(200, lineup([1, 2, 3, 4, 6])),
            Err(StintError::NegativeDuration {
                start_secs: 300,
                close_secs: 200
            })
        ));
    }

    #[test]
    fn test_zero_duration_stints_kept_in_order() {
        let mut tracker = LineupStintTracker::new(1);
        tracker.observe_lineup(100, lineup([1, 2, 3, 4, 5])).unwrap();
        tracker.observe_lineup(100, lineup([1, 2, 3, 4, 6])).unwrap();
        tracker.observe_lineup(100, lineup([1, 2, 3, 4, 7])).unwrap();

        let stints = tracker.stints();
        assert_eq!(stints.len(), 3);
        assert_eq!(stints[0].duration_seconds, Some(0));
        assert_eq!(stints[1].duration_seconds, Some(0));
        assert!(stints[2].is_open());
    }

    #[test]
    fn test_contiguous_non_overlapping() {
        let mut tracker = LineupStintTracker::new(1);
        tracker.observe_lineup(0, lineup([1, 2, 3, 4, 5])).unwrap();
        tracker.observe_lineup(240, lineup([1, 2, 3, 4, 6])).unwrap();
        tracker.observe_lineup(480, lineup([1, 2, 3, 7, 6])).unwrap();
        tracker.close_game(600).unwrap();

        let stints = tracker.stints();
        assert_eq!(stints.len(), 3);
        for pair in stints.windows(2) {
            assert_eq!(pair[0].end_time_seconds, Some(pair[1].start_time_seconds));
        }
        assert!(stints.iter().all(|s| !s.is_open()));
    }

    #[test]
    fn test_player_seconds() {
        let mut tracker = LineupStintTracker::new(1);
        tracker.observe_lineup(0, lineup([1, 2, 3, 4, 5])).unwrap();
        tracker.observe_lineup(300, lineup([1, 2, 3, 4, 6])).unwrap();
        tracker.close_game(600).unwrap();

        let seconds = tracker.player_seconds();
        assert_eq!(seconds[&1], 600);
        assert_eq!(seconds[&5], 300);
        assert_eq!(seconds[&6], 300);
    }

    #[test]
    fn test_score_totals() {
        let mut tracker = LineupStintTracker::new(1);
        tracker.observe_lineup(0, lineup([1, 2, 3, 4, 5])).unwrap();
        tracker.record_score(10, true).unwrap();
        tracker.record_score(8, false).unwrap();
        tracker.observe_lineup(300, lineup([1, 2, 3, 4, 6])).unwrap();
        tracker.record_score(5, true).unwrap();
        tracker.close_game(600).unwrap();

        assert_eq!(tracker.score_totals(), (15, 8));
    }
}
