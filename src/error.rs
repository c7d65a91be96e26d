use thiserror::Error;

use crate::domain::clock::GameClock;

/// Main error type for the tracking engine
#[derive(Error, Debug)]
pub enum QuicktrackError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Network errors (roster service)
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Game lifecycle errors
    #[error("Game not found: {0}")]
    GameNotFound(String),

    #[error("Game already completed: {0}")]
    GameCompleted(String),

    #[error("Game halted after invariant violation: {game_id} - {reason}")]
    GameHalted { game_id: String, reason: String },

    // Event rejection (validation failed before any state mutation)
    #[error("Event rejected: {0}")]
    Rejected(RejectReason),

    // Invariant violations (fatal for the affected game)
    #[error("Stint invariant violated: {0}")]
    Stint(#[from] StintError),

    // Transient persistence failures (event not applied, safe to retry)
    #[error("Persistence commit timed out after {elapsed_ms}ms")]
    CommitTimeout { elapsed_ms: u64 },

    // Roster service errors
    #[error("Roster service error: {0}")]
    Roster(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for QuicktrackError
pub type Result<T> = std::result::Result<T, QuicktrackError>;

/// Reasons an incoming event is rejected by the validator.
///
/// Rejections happen before any state mutation and never reach downstream
/// components; the caller decides whether to surface, log, or retry with a
/// corrected event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("CLOCK_REGRESSION: event at {event} is earlier than watermark {watermark}")]
    ClockRegression {
        event: GameClock,
        watermark: GameClock,
    },

    #[error("INVALID_LINEUP_SIZE: expected 5 distinct players, got {got}")]
    InvalidLineupSize { got: usize },

    #[error("UNKNOWN_PLAYER: player {player_id} is not on the game roster or not eligible")]
    UnknownPlayer { player_id: i64 },

    #[error("DUPLICATE_EVENT: event {event_id} was already committed for this game")]
    DuplicateEvent { event_id: uuid::Uuid },

    #[error("MODEL_MISMATCH: {detail}")]
    ModelMismatch { detail: String },
}

impl RejectReason {
    /// Stable machine-readable code for callers and logs.
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::ClockRegression { .. } => "CLOCK_REGRESSION",
            RejectReason::InvalidLineupSize { .. } => "INVALID_LINEUP_SIZE",
            RejectReason::UnknownPlayer { .. } => "UNKNOWN_PLAYER",
            RejectReason::DuplicateEvent { .. } => "DUPLICATE_EVENT",
            RejectReason::ModelMismatch { .. } => "MODEL_MISMATCH",
        }
    }
}

/// Invariant violations in the stint stream.
///
/// These are fatal for the affected game: the engine halts further event
/// application rather than compounding derived-state corruption.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StintError {
    #[error("NEGATIVE_DURATION: close at {close_secs}s precedes stint start {start_secs}s")]
    NegativeDuration { start_secs: u32, close_secs: u32 },

    #[error("NO_OPEN_STINT: scoring event before any lineup was observed")]
    NoOpenStint,
}

impl From<RejectReason> for QuicktrackError {
    fn from(reason: RejectReason) -> Self {
        QuicktrackError::Rejected(reason)
    }
}
