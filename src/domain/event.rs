use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::clock::GameClock;
use super::lineup::{Lineup, PlayerId};

/// Result of a completed possession.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PossessionOutcome {
    Good,
    Neutral,
    Failed,
}

impl PossessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PossessionOutcome::Good => "GOOD",
            PossessionOutcome::Neutral => "NEUTRAL",
            PossessionOutcome::Failed => "FAILED",
        }
    }
}

impl fmt::Display for PossessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for PossessionOutcome {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "GOOD" => Ok(PossessionOutcome::Good),
            "NEUTRAL" => Ok(PossessionOutcome::Neutral),
            "FAILED" => Ok(PossessionOutcome::Failed),
            _ => Err(format!("unknown possession outcome: {}", s)),
        }
    }
}

/// Why a FAILED possession broke down. Process-focused vocabulary: the point
/// is coaching feedback, not scorekeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureType {
    Turnover,
    BallAdvancement,
    ShotSelection,
    BadProcess,
}

impl FailureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureType::Turnover => "Turnover",
            FailureType::BallAdvancement => "Ball_Advancement",
            FailureType::ShotSelection => "Shot_Selection",
            FailureType::BadProcess => "Bad_Process",
        }
    }

    pub const ALL: [FailureType; 4] = [
        FailureType::Turnover,
        FailureType::BallAdvancement,
        FailureType::ShotSelection,
        FailureType::BadProcess,
    ];
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for FailureType {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "Turnover" => Ok(FailureType::Turnover),
            "Ball_Advancement" => Ok(FailureType::BallAdvancement),
            "Shot_Selection" => Ok(FailureType::ShotSelection),
            "Bad_Process" => Ok(FailureType::BadProcess),
            _ => Err(format!("unknown failure type: {}", s)),
        }
    }
}

/// Shot classification, which also fixes the point value of a make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShotType {
    FreeThrow,
    TwoPoint,
    ThreePoint,
}

impl ShotType {
    pub fn points(&self) -> i32 {
        match self {
            ShotType::FreeThrow => 1,
            ShotType::TwoPoint => 2,
            ShotType::ThreePoint => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShotType::FreeThrow => "FT",
            ShotType::TwoPoint => "2PT",
            ShotType::ThreePoint => "3PT",
        }
    }
}

impl fmt::Display for ShotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for ShotType {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "FT" => Ok(ShotType::FreeThrow),
            "2PT" => Ok(ShotType::TwoPoint),
            "3PT" => Ok(ShotType::ThreePoint),
            _ => Err(format!("unknown shot type: {}", s)),
        }
    }
}

/// Quality of the look, independent of whether it went in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShotQuality {
    Open,
    Contested,
    Forced,
}

impl ShotQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShotQuality::Open => "Open",
            ShotQuality::Contested => "Contested",
            ShotQuality::Forced => "Forced",
        }
    }
}

impl fmt::Display for ShotQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal action of a detailed possession's shot attempt, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShotResult {
    Made,
    Missed,
    Blocked,
    Fouled,
}

impl ShotResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShotResult::Made => "Made",
            ShotResult::Missed => "Missed",
            ShotResult::Blocked => "Blocked",
            ShotResult::Fouled => "Fouled",
        }
    }
}

impl fmt::Display for ShotResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the ball got into the front court on a detailed possession.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BallAdvancement {
    Transition,
    HalfCourt,
    Stagnant,
}

impl BallAdvancement {
    pub fn as_str(&self) -> &'static str {
        match self {
            BallAdvancement::Transition => "Transition",
            BallAdvancement::HalfCourt => "HalfCourt",
            BallAdvancement::Stagnant => "Stagnant",
        }
    }
}

impl fmt::Display for BallAdvancement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Counting stat attributed to a single player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    Assist,
    ReboundOffensive,
    ReboundDefensive,
    Turnover,
    Steal,
    Block,
    Foul,
}

impl StatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatKind::Assist => "assist",
            StatKind::ReboundOffensive => "rebound_offensive",
            StatKind::ReboundDefensive => "rebound_defensive",
            StatKind::Turnover => "turnover",
            StatKind::Steal => "steal",
            StatKind::Block => "block",
            StatKind::Foul => "foul",
        }
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The payload of a submitted event. The possession variants are mutually
/// exclusive per game: which one is legal depends on the game's possession
/// model tag, checked by the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    /// The five players now on the floor.
    LineupChange { lineup: Lineup },

    /// Simple-model possession. `failure_type` is present iff the outcome is
    /// FAILED.
    Possession {
        outcome: PossessionOutcome,
        failure_type: Option<FailureType>,
    },

    /// Complex-model possession. The momentum snapshot on the persisted row
    /// is assigned by the engine, never by the caller.
    DetailedPossession {
        outcome: PossessionOutcome,
        failure_type: Option<FailureType>,
        ball_advancement: BallAdvancement,
        shot_quality: Option<ShotQuality>,
        shooter: Option<PlayerId>,
        shot_type: Option<ShotType>,
        shot_result: Option<ShotResult>,
        points_scored: i32,
    },

    /// Shot attempt, recorded under either model. A make scores
    /// `shot_type.points()` to the shooter and the open stint.
    Shot {
        player: PlayerId,
        shot_type: ShotType,
        quality: Option<ShotQuality>,
        made: bool,
        x: Option<f64>,
        y: Option<f64>,
    },

    /// Opposing team scored; counts against the open stint and every
    /// on-court player's plus-minus.
    OpponentScore { points: i32 },

    /// Single counting stat for one player.
    Stat { player: PlayerId, kind: StatKind },

    /// Advances derived time (energy sampling) with no other effect.
    ClockTick,

    /// Compensating correction to an already-counted stat. Negative deltas
    /// clamp the counter at zero.
    StatCorrection {
        player: PlayerId,
        kind: StatKind,
        delta: i32,
    },
}

impl GameEvent {
    /// Players referenced by this event, for roster validation.
    pub fn referenced_players(&self) -> Vec<PlayerId> {
        match self {
            GameEvent::LineupChange { lineup } => lineup.to_vec(),
            GameEvent::DetailedPossession { shooter, .. } => shooter.iter().copied().collect(),
            GameEvent::Shot { player, .. }
            | GameEvent::Stat { player, .. }
            | GameEvent::StatCorrection { player, .. } => vec![*player],
            _ => Vec::new(),
        }
    }

    /// Short tag for logs and the raw event log.
    pub fn kind(&self) -> &'static str {
        match self {
            GameEvent::LineupChange { .. } => "lineup_change",
            GameEvent::Possession { .. } => "possession",
            GameEvent::DetailedPossession { .. } => "detailed_possession",
            GameEvent::Shot { .. } => "shot",
            GameEvent::OpponentScore { .. } => "opponent_score",
            GameEvent::Stat { .. } => "stat",
            GameEvent::ClockTick => "clock_tick",
            GameEvent::StatCorrection { .. } => "stat_correction",
        }
    }
}

/// A submitted event: payload plus the identity and clock position every
/// event must carry. `event_id` is the idempotency key for retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedEvent {
    pub event_id: Uuid,
    pub clock: GameClock,
    #[serde(flatten)]
    pub payload: GameEvent,
}

impl SubmittedEvent {
    pub fn new(clock: GameClock, payload: GameEvent) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            clock,
            payload,
        }
    }
}

/// An accepted event as it sits in the raw event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    pub game_id: i64,
    pub seq: i64,
    pub event: SubmittedEvent,
    pub created_at: DateTime<Utc>,
}
