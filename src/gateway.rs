//! Seams between the engine and its collaborators.
//!
//! The engine talks to storage through `PersistenceGateway` and to the
//! roster service through `RosterProvider`. Both are async traits so the
//! Postgres and HTTP adapters, test mocks and in-memory fakes are
//! interchangeable.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::domain::{
    DerivedRows, FinalScores, GameId, GameMeta, PlayerGameStatRow, PlayerId, StoredEvent,
    SubmittedEvent,
};
use crate::error::Result;

/// Storage boundary. `commit_event` must apply the raw event append and the
/// whole derived-row set atomically; a failure means none of it happened and
/// the submission is safe to retry under the same event id.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn load_game(&self, game_id: GameId) -> Result<GameMeta>;

    /// Append the raw event at `seq` and apply its derived rows in one
    /// transaction.
    async fn commit_event(
        &self,
        game_id: GameId,
        seq: i64,
        event: &SubmittedEvent,
        derived: &DerivedRows,
    ) -> Result<()>;

    /// The raw event log for a game, in sequence order.
    async fn load_events(&self, game_id: GameId) -> Result<Vec<StoredEvent>>;

    /// Mark the game completed with its final scores and write the
    /// closing derived rows (closed stint, minutes) atomically.
    async fn finalize_game(
        &self,
        game_id: GameId,
        scores: FinalScores,
        stats: &[PlayerGameStatRow],
        closing: &DerivedRows,
    ) -> Result<()>;
}

/// Roster boundary. Eligibility is a policy the provider owns; the engine
/// only asks, it never decides.
#[async_trait]
pub trait RosterProvider: Send + Sync {
    /// Players on the roster for this game.
    async fn game_roster(&self, game_id: GameId) -> Result<Vec<PlayerId>>;

    /// Whether a rostered player may currently take the floor. Providers
    /// without eligibility data answer true.
    async fn is_eligible(&self, game_id: GameId, player: PlayerId) -> Result<bool> {
        let _ = (game_id, player);
        Ok(true)
    }
}

/// Fixed in-memory roster, for tests and offline replay where no roster
/// service is reachable.
#[derive(Debug, Clone, Default)]
pub struct StaticRoster {
    rosters: HashMap<GameId, Vec<PlayerId>>,
    ineligible: HashSet<(GameId, PlayerId)>,
}

impl StaticRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roster(mut self, game_id: GameId, players: impl IntoIterator<Item = PlayerId>) -> Self {
        self.rosters.insert(game_id, players.into_iter().collect());
        self
    }

    pub fn mark_ineligible(&mut self, game_id: GameId, player: PlayerId) {
        self.ineligible.insert((game_id, player));
    }
}

#[async_trait]
impl RosterProvider for StaticRoster {
    async fn game_roster(&self, game_id: GameId) -> Result<Vec<PlayerId>> {
        Ok(self.rosters.get(&game_id).cloned().unwrap_or_default())
    }

    async fn is_eligible(&self, game_id: GameId, player: PlayerId) -> Result<bool> {
        Ok(!self.ineligible.contains(&(game_id, player)))
    }
}
