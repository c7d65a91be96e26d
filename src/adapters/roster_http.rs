//! HTTP roster adapter.
//!
//! Thin client over the team-management service's REST surface. The engine
//! resolves eligibility once per game load, so request volume is low and a
//! plain request-per-call client is enough; no caching layer here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::config::RosterConfig;
use crate::domain::{GameId, PlayerId};
use crate::error::{QuicktrackError, Result};
use crate::gateway::RosterProvider;

#[derive(Debug, Deserialize)]
struct RosterResponse {
    players: Vec<RosterEntry>,
}

#[derive(Debug, Deserialize)]
struct RosterEntry {
    player_id: PlayerId,
    #[serde(default = "default_eligible")]
    eligible: bool,
}

fn default_eligible() -> bool {
    true
}

/// Roster provider backed by the team-management HTTP service.
#[derive(Clone)]
pub struct HttpRosterProvider {
    http: Client,
    base_url: String,
}

impl HttpRosterProvider {
    pub fn new(config: &RosterConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();

        let http = Client::builder()
            .user_agent("quicktrack-roster-client/0.1")
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| {
                QuicktrackError::Internal(format!("failed to build roster HTTP client: {}", e))
            })?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch_roster(&self, game_id: GameId) -> Result<RosterResponse> {
        let url = format!("{}/games/{}/roster", self.base_url, game_id);
        let response = self.http.get(&url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(QuicktrackError::Roster(format!(
                "no roster published for game {}",
                game_id
            ))),
            status if !status.is_success() => Err(QuicktrackError::Roster(format!(
                "roster service returned {} for game {}",
                status, game_id
            ))),
            _ => {
                let roster: RosterResponse = response.json().await?;
                debug!(
                    game_id,
                    players = roster.players.len(),
                    "fetched roster"
                );
                Ok(roster)
            }
        }
    }
}

#[async_trait]
impl RosterProvider for HttpRosterProvider {
    async fn game_roster(&self, game_id: GameId) -> Result<Vec<PlayerId>> {
        let roster = self.fetch_roster(game_id).await?;
        Ok(roster.players.iter().map(|p| p.player_id).collect())
    }

    async fn is_eligible(&self, game_id: GameId, player: PlayerId) -> Result<bool> {
        let roster = self.fetch_roster(game_id).await?;
        Ok(roster
            .players
            .iter()
            .any(|p| p.player_id == player && p.eligible))
    }
}
