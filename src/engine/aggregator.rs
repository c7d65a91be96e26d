//! Box-score aggregation.
//!
//! One row per (game, player), mutated incrementally as events arrive.
//! Counting stats only move up; plus-minus moves both ways; corrections are
//! compensating deltas clamped at zero. At game close the team plus-minus
//! sum is reconciled against the stint score totals.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::domain::{GameId, Lineup, PlayerGameStatRow, PlayerId, StatKind};

#[derive(Debug, Clone)]
pub struct StatAggregator {
    game_id: GameId,
    stats: HashMap<PlayerId, PlayerGameStatRow>,
}

/// Outcome of the close-time plus-minus check. A mismatch flags the game for
/// manual review; the completed record stands either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub plus_minus_sum: i32,
    pub expected: i32,
}

impl ReconciliationReport {
    pub fn matches(&self) -> bool {
        self.plus_minus_sum == self.expected
    }
}

impl StatAggregator {
    pub fn new(game_id: GameId) -> Self {
        Self {
            game_id,
            stats: HashMap::new(),
        }
    }

    pub fn get(&self, player: PlayerId) -> Option<&PlayerGameStatRow> {
        self.stats.get(&player)
    }

    /// All rows, ordered by player id.
    pub fn rows(&self) -> Vec<PlayerGameStatRow> {
        let mut rows: Vec<PlayerGameStatRow> = self.stats.values().cloned().collect();
        rows.sort_by_key(|r| r.player_id);
        rows
    }

    /// A made shot: points to the shooter, +points of plus-minus to every
    /// player on the floor. Returns the changed rows for the commit batch.
    pub fn record_made_shot(
        &mut self,
        shooter: PlayerId,
        points: i32,
        on_court: &Lineup,
    ) -> Vec<PlayerGameStatRow> {
        self.row_mut(shooter).points += points;
        let mut dirty = vec![shooter];
        for player in on_court.players() {
            self.row_mut(player).plus_minus += points;
            if player != shooter {
                dirty.push(player);
            }
        }
        self.collect_dirty(dirty)
    }

    /// Team points scored with no identified shooter (detailed possessions
    /// without a shot record). Only plus-minus moves.
    pub fn record_team_score(&mut self, points: i32, on_court: &Lineup) -> Vec<PlayerGameStatRow> {
        let mut dirty = Vec::new();
        for player in on_court.players() {
            self.row_mut(player).plus_minus += points;
            dirty.push(player);
        }
        self.collect_dirty(dirty)
    }

    /// Opponent points: -points of plus-minus for every player on the floor.
    pub fn record_opponent_score(
        &mut self,
        points: i32,
        on_court: &Lineup,
    ) -> Vec<PlayerGameStatRow> {
        self.record_team_score(-points, on_court)
    }

    /// Increment one counting stat.
    pub fn record_stat(&mut self, player: PlayerId, kind: StatKind) -> PlayerGameStatRow {
        *self.field_mut(player, kind) += 1;
        self.stats[&player].clone()
    }

    /// Apply a compensating correction. Decrements clamp at zero rather than
    /// going negative.
    pub fn apply_correction(
        &mut self,
        player: PlayerId,
        kind: StatKind,
        delta: i32,
    ) -> PlayerGameStatRow {
        let field = self.field_mut(player, kind);
        *field = (*field + delta).max(0);
        self.stats[&player].clone()
    }

    /// Set minutes played from stint membership, at game close.
    pub fn set_minutes(&mut self, player_seconds: &HashMap<PlayerId, u32>) -> Vec<PlayerGameStatRow> {
        let mut dirty = Vec::new();
        for (&player, &seconds) in player_seconds {
            self.row_mut(player).minutes_played = Decimal::from(seconds) / Decimal::from(60);
            dirty.push(player);
        }
        self.collect_dirty(dirty)
    }

    /// Check the team plus-minus sum against the net score differential.
    /// Every scored point moves five plus-minus counters, so the expected
    /// sum is five times the differential.
    pub fn reconcile(&self, points_for: i32, points_against: i32) -> ReconciliationReport {
        let plus_minus_sum: i32 = self.stats.values().map(|r| r.plus_minus).sum();
        ReconciliationReport {
            plus_minus_sum,
            expected: 5 * (points_for - points_against),
        }
    }

    fn row_mut(&mut self, player: PlayerId) -> &mut PlayerGameStatRow {
        let game_id = self.game_id;
        self.stats
            .entry(player)
            .or_insert_with(|| PlayerGameStatRow::new(game_id, player))
    }

    fn field_mut(&mut self, player: PlayerId, kind: StatKind) -> &mut i32 {
        let row = self.row_mut(player);
        match kind {
            StatKind::Assist => &mut row.assists,
            StatKind::ReboundOffensive => &mut row.rebounds_offensive,
            StatKind::ReboundDefensive => &mut row.rebounds_defensive,
            StatKind::Turnover => &mut row.turnovers,
            StatKind::Steal => &mut row.steals,
            StatKind::Block => &mut row.blocks,
            StatKind::Foul => &mut row.fouls,
        }
    }

    fn collect_dirty(&self, mut players: Vec<PlayerId>) -> Vec<PlayerGameStatRow> {
        players.sort_unstable();
        players.dedup();
        players
            .into_iter()
            .filter_map(|p| self.stats.get(&p).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn lineup(ids: [PlayerId; 5]) -> Lineup {
        Lineup::new(ids).unwrap()
    }

    #[test]
    fn test_made_shot_scores_and_plus_minus() {
        let mut agg = StatAggregator::new(1);
        let on_court = lineup([1, 2, 3, 4, 5]);
        let dirty = agg.record_made_shot(3, 2, &on_court);
        assert_eq!(dirty.len(), 5);

        assert_eq!(agg.get(3).unwrap().points, 2);
        for p in 1..=5 {
            assert_eq!(agg.get(p).unwrap().plus_minus, 2);
        }
    }

    #[test]
    fn test_opponent_score_negative_plus_minus() {
        let mut agg = StatAggregator::new(1);
        let on_court = lineup([1, 2, 3, 4, 5]);
        agg.record_opponent_score(3, &on_court);
        for p in 1..=5 {
            assert_eq!(agg.get(p).unwrap().plus_minus, -3);
        }
    }

    #[test]
    fn test_counting_stats() {
        let mut agg = StatAggregator::new(1);
        agg.record_stat(7, StatKind::Assist);
        agg.record_stat(7, StatKind::Assist);
        agg.record_stat(7, StatKind::ReboundDefensive);
        let row = agg.get(7).unwrap();
        assert_eq!(row.assists, 2);
        assert_eq!(row.rebounds_defensive, 1);
        assert_eq!(row.rebounds_total(), 1);
    }

    #[test]
    fn test_correction_clamps_at_zero() {
        let mut agg = StatAggregator::new(1);
        agg.record_stat(7, StatKind::Turnover);
        let row = agg.apply_correction(7, StatKind::Turnover, -3);
        assert_eq!(row.turnovers, 0);
    }

    #[test]
    fn test_minutes_from_seconds() {
        let mut agg = StatAggregator::new(1);
        let seconds: HashMap<PlayerId, u32> = [(1, 600), (2, 90)].into_iter().collect();
        agg.set_minutes(&seconds);
        assert_eq!(agg.get(1).unwrap().minutes_played, dec!(10));
        assert_eq!(agg.get(2).unwrap().minutes_played, dec!(1.5));
    }

    #[test]
    fn test_reconciliation() {
        let mut agg = StatAggregator::new(1);
        let on_court = lineup([1, 2, 3, 4, 5]);
        agg.record_made_shot(1, 2, &on_court);
        agg.record_made_shot(2, 3, &on_court);
        agg.record_opponent_score(2, &on_court);

        // net differential 3, five counters each
        let report = agg.reconcile(5, 2);
        assert_eq!(report.plus_minus_sum, 15);
        assert_eq!(report.expected, 15);
        assert!(report.matches());
    }

    #[test]
    fn test_reconciliation_mismatch_detected() {
        let mut agg = StatAggregator::new(1);
        let on_court = lineup([1, 2, 3, 4, 5]);
        agg.record_made_shot(1, 2, &on_court);
        let report = agg.reconcile(4, 0);
        assert!(!report.matches());
    }
}
