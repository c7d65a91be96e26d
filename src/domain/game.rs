use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Database identifier for a game.
pub type GameId = i64;

/// Home or away, as recorded on the game row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Location {
    Home,
    Away,
}

impl Location {
    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Home => "HOME",
            Location::Away => "AWAY",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Location {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "HOME" => Ok(Location::Home),
            "AWAY" => Ok(Location::Away),
            _ => Err(format!("unknown location: {}", s)),
        }
    }
}

/// Which possession-record shape a game uses. Fixed at game creation; every
/// possession event for the game must match it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PossessionModel {
    Simple,
    Detailed,
}

impl PossessionModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PossessionModel::Simple => "simple",
            PossessionModel::Detailed => "detailed",
        }
    }
}

impl fmt::Display for PossessionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for PossessionModel {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "simple" => Ok(PossessionModel::Simple),
            "detailed" => Ok(PossessionModel::Detailed),
            _ => Err(format!("unknown possession model: {}", s)),
        }
    }
}

/// Game header row. The possession model tag is owned here, not by events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameMeta {
    pub id: GameId,
    pub team_id: i64,
    pub date: NaiveDate,
    pub opponent: String,
    pub location: Location,
    pub possession_model: PossessionModel,
    pub final_score_us: Option<i32>,
    pub final_score_them: Option<i32>,
    pub completed: bool,
}

/// Final score pair passed to game close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalScores {
    pub us: i32,
    pub them: i32,
}
