pub mod adapters;
pub mod analytics;
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod gateway;

pub use config::AppConfig;
pub use domain::{
    DerivedRows, FinalScores, GameClock, GameEvent, GameId, GameMeta, Lineup, PlayerId,
    PossessionModel, PossessionOutcome, SubmitOutcome, SubmittedEvent,
};
pub use engine::GameEventEngine;
pub use error::{QuicktrackError, RejectReason, Result, StintError};
pub use gateway::{PersistenceGateway, RosterProvider, StaticRoster};
