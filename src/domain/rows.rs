use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::{
    BallAdvancement, FailureType, PossessionOutcome, ShotQuality, ShotResult, ShotType,
};
use super::game::GameId;
use super::lineup::{Lineup, PlayerId};

/// Simple-model possession row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PossessionRow {
    pub game_id: GameId,
    pub quarter: u32,
    pub time_remaining_seconds: u32,
    pub outcome: PossessionOutcome,
    pub failure_type: Option<FailureType>,
    pub lineup: Lineup,
}

/// Complex-model possession row. `momentum_state` is the engine's snapshot
/// after folding this possession's outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedPossessionRow {
    pub game_id: GameId,
    pub quarter: u32,
    pub time_elapsed_seconds: u32,
    pub lineup: Lineup,
    pub ball_advancement: BallAdvancement,
    pub shot_quality: Option<ShotQuality>,
    pub shooter_id: Option<PlayerId>,
    pub shot_type: Option<ShotType>,
    pub shot_result: Option<ShotResult>,
    pub outcome: PossessionOutcome,
    pub failure_type: Option<FailureType>,
    pub points_scored: i32,
    pub momentum_state: i32,
}

/// Shot-chart row, recorded under either possession model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotRow {
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub quarter: u32,
    pub time_elapsed_seconds: u32,
    pub shot_type: ShotType,
    pub quality: Option<ShotQuality>,
    pub made: bool,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

/// One stint of a fixed five-player lineup.
///
/// `stint_no` is the per-game ordinal assigned at open; (game_id, stint_no)
/// is the upsert key, so score updates and the eventual close rewrite the
/// same row deterministically under replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineupStintRow {
    pub game_id: GameId,
    pub stint_no: i32,
    pub lineup: Lineup,
    pub start_time_seconds: u32,
    pub end_time_seconds: Option<u32>,
    pub duration_seconds: Option<u32>,
    pub points_for: i32,
    pub points_against: i32,
}

impl LineupStintRow {
    pub fn is_open(&self) -> bool {
        self.end_time_seconds.is_none()
    }
}

/// Append-only energy reading for one player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergySampleRow {
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub time_elapsed_seconds: u32,
    pub energy_level: Decimal,
}

/// Box-score row, upserted per (game, player) as events arrive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerGameStatRow {
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub minutes_played: Decimal,
    pub points: i32,
    pub assists: i32,
    pub rebounds_offensive: i32,
    pub rebounds_defensive: i32,
    pub turnovers: i32,
    pub steals: i32,
    pub blocks: i32,
    pub fouls: i32,
    pub plus_minus: i32,
}

impl PlayerGameStatRow {
    pub fn new(game_id: GameId, player_id: PlayerId) -> Self {
        Self {
            game_id,
            player_id,
            minutes_played: Decimal::ZERO,
            points: 0,
            assists: 0,
            rebounds_offensive: 0,
            rebounds_defensive: 0,
            turnovers: 0,
            steals: 0,
            blocks: 0,
            fouls: 0,
            plus_minus: 0,
        }
    }

    pub fn rebounds_total(&self) -> i32 {
        self.rebounds_offensive + self.rebounds_defensive
    }
}

/// Everything one accepted event produced, committed atomically alongside
/// the raw event append. Stint rows are upserts on (game_id, stint_no); stat
/// rows are upserts on (game_id, player_id); the rest are inserts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedRows {
    pub possessions: Vec<PossessionRow>,
    pub detailed_possessions: Vec<DetailedPossessionRow>,
    pub shots: Vec<ShotRow>,
    pub stint_upserts: Vec<LineupStintRow>,
    pub energy_samples: Vec<EnergySampleRow>,
    pub stat_upserts: Vec<PlayerGameStatRow>,
}

impl DerivedRows {
    pub fn is_empty(&self) -> bool {
        self.possessions.is_empty()
            && self.detailed_possessions.is_empty()
            && self.shots.is_empty()
            && self.stint_upserts.is_empty()
            && self.energy_samples.is_empty()
            && self.stat_upserts.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.possessions.len()
            + self.detailed_possessions.len()
            + self.shots.len()
            + self.stint_upserts.len()
            + self.energy_samples.len()
            + self.stat_upserts.len()
    }
}

/// Outcome of `submit_event`: either the event was committed with its
/// derived rows, or it was rejected before any state mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SubmitOutcome {
    Accepted {
        event_id: Uuid,
        seq: i64,
        derived: DerivedRows,
    },
    Rejected {
        event_id: Uuid,
        code: String,
        detail: String,
    },
}

impl SubmitOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_derived_rows() {
        let rows = DerivedRows::default();
        assert!(rows.is_empty());
        assert_eq!(rows.row_count(), 0);
    }

    #[test]
    fn test_stat_row_starts_zeroed() {
        let row = PlayerGameStatRow::new(1, 42);
        assert_eq!(row.points, 0);
        assert_eq!(row.plus_minus, 0);
        assert_eq!(row.minutes_played, Decimal::ZERO);
        assert_eq!(row.rebounds_total(), 0);
    }
}
