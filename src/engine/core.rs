//! Game event engine.
//!
//! One serialized writer per game: every submission for a game runs under
//! that game's lock, so at most one event is in flight per game while
//! distinct games process in parallel. Derived state mutates copy-on-write:
//! an event is applied to a clone of the game state, the clone is committed
//! through the persistence gateway, and only a successful commit swaps the
//! clone in. A failed or timed-out commit leaves both memory and storage on
//! the previous event boundary, so resubmission under the same event id is
//! safe.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::domain::{
    DerivedRows, FinalScores, GameClock, GameEvent, GameId, GameMeta, LineupStintRow,
    PlayerGameStatRow, PlayerId, PossessionRow, SubmitOutcome, SubmittedEvent,
};
use crate::domain::{DetailedPossessionRow, ShotResult, ShotRow};
use crate::engine::aggregator::{ReconciliationReport, StatAggregator};
use crate::engine::energy::EnergyModel;
use crate::engine::momentum::MomentumCalculator;
use crate::engine::stints::LineupStintTracker;
use crate::engine::validator::{validate_event, ValidationContext};
use crate::error::{QuicktrackError, Result, StintError};
use crate::gateway::{PersistenceGateway, RosterProvider};

/// Per-game derived state. Cloned, mutated, and swapped back on commit
/// success; cheap enough to copy at basketball event rates.
#[derive(Debug, Clone)]
struct GameState {
    watermark: Option<GameClock>,
    committed_ids: HashSet<Uuid>,
    next_seq: i64,
    stints: LineupStintTracker,
    energy: EnergyModel,
    momentum: MomentumCalculator,
    aggregator: StatAggregator,
}

impl GameState {
    fn new(game_id: GameId, config: &AppConfig) -> Self {
        Self {
            watermark: None,
            committed_ids: HashSet::new(),
            next_seq: 1,
            stints: LineupStintTracker::new(game_id),
            energy: EnergyModel::new(game_id, config.energy.clone()),
            momentum: MomentumCalculator::new(config.momentum.clone()),
            aggregator: StatAggregator::new(game_id),
        }
    }
}

/// One game's slot in the engine map. The mutex is the per-game serializer.
struct GameSlot {
    meta: GameMeta,
    eligible: HashSet<PlayerId>,
    state: GameState,
    halted: Option<String>,
}

/// Handle to a loaded game, exposed for tests that need to inspect state
/// between submissions.
pub struct GameHandle {
    slot: Arc<Mutex<GameSlot>>,
}

impl GameHandle {
    pub async fn momentum(&self) -> i32 {
        self.slot.lock().await.state.momentum.value()
    }

    pub async fn stints(&self) -> Vec<LineupStintRow> {
        self.slot.lock().await.state.stints.stints().to_vec()
    }

    pub async fn stat_rows(&self) -> Vec<PlayerGameStatRow> {
        self.slot.lock().await.state.aggregator.rows()
    }

    pub async fn is_halted(&self) -> bool {
        self.slot.lock().await.halted.is_some()
    }
}

/// Deterministic reconstruction of a game's derived state from its raw
/// event log.
#[derive(Debug)]
pub struct ReplayedGame {
    pub game_id: GameId,
    pub events_applied: usize,
    pub stints: Vec<LineupStintRow>,
    pub stats: Vec<PlayerGameStatRow>,
    pub momentum: i32,
}

pub struct GameEventEngine {
    config: AppConfig,
    gateway: Arc<dyn PersistenceGateway>,
    roster: Arc<dyn RosterProvider>,
    games: DashMap<GameId, Arc<Mutex<GameSlot>>>,
}

impl GameEventEngine {
    pub fn new(
        config: AppConfig,
        gateway: Arc<dyn PersistenceGateway>,
        roster: Arc<dyn RosterProvider>,
    ) -> Self {
        Self {
            config,
            gateway,
            roster,
            games: DashMap::new(),
        }
    }

    /// Submit one event. Returns `Rejected` for validation failures (no
    /// state touched) and errors for halted games, commit failures and
    /// invariant violations.
    #[instrument(skip(self, event), fields(event_id = %event.event_id, kind = event.payload.kind()))]
    pub async fn submit_event(
        &self,
        game_id: GameId,
        event: SubmittedEvent,
    ) -> Result<SubmitOutcome> {
        let slot = self.load_slot(game_id).await?;
        let mut slot = slot.lock().await;

        if let Some(reason) = &slot.halted {
            return Err(QuicktrackError::GameHalted {
                game_id: game_id.to_string(),
                reason: reason.clone(),
            });
        }
        if slot.meta.completed {
            return Err(QuicktrackError::GameCompleted(game_id.to_string()));
        }

        let ctx = ValidationContext {
            model: slot.meta.possession_model,
            watermark: slot.state.watermark,
            committed_ids: &slot.state.committed_ids,
            eligible: &slot.eligible,
        };
        if let Err(reason) = validate_event(&ctx, &event) {
            debug!(game_id, code = reason.code(), "event rejected");
            return Ok(SubmitOutcome::Rejected {
                event_id: event.event_id,
                code: reason.code().to_string(),
                detail: reason.to_string(),
            });
        }

        // Apply to a clone; the committed state stays untouched until the
        // gateway confirms.
        let mut next = slot.state.clone();
        let derived = match apply_event(&mut next, &self.config, &event) {
            Ok(derived) => derived,
            Err(stint_err) => {
                let reason = stint_err.to_string();
                warn!(game_id, %reason, "invariant violation, halting game");
                slot.halted = Some(reason);
                return Err(QuicktrackError::Stint(stint_err));
            }
        };

        let seq = slot.state.next_seq;
        self.commit(game_id, seq, &event, &derived).await?;

        slot.state = next;
        debug!(game_id, seq, rows = derived.row_count(), "event committed");
        Ok(SubmitOutcome::Accepted {
            event_id: event.event_id,
            seq,
            derived,
        })
    }

    /// Close a game: close the open stint, derive minutes from stint
    /// membership, persist final scores and report the plus-minus
    /// reconciliation. A reconciliation mismatch is a warning, not an error.
    #[instrument(skip(self))]
    pub async fn close_game(
        &self,
        game_id: GameId,
        scores: FinalScores,
    ) -> Result<(Vec<PlayerGameStatRow>, ReconciliationReport)> {
        let slot = self.load_slot(game_id).await?;
        let mut slot = slot.lock().await;

        if let Some(reason) = &slot.halted {
            return Err(QuicktrackError::GameHalted {
                game_id: game_id.to_string(),
                reason: reason.clone(),
            });
        }
        if slot.meta.completed {
            return Err(QuicktrackError::GameCompleted(game_id.to_string()));
        }

        let close_secs = slot
            .state
            .watermark
            .map(|c| c.total_seconds(self.config.engine.quarter_length_secs))
            .unwrap_or(0);

        let mut next = slot.state.clone();
        let mut closing = DerivedRows::default();

        match next.stints.close_game(close_secs) {
            Ok(Some(closed)) => closing.stint_upserts.push(closed),
            Ok(None) => {}
            Err(stint_err) => {
                slot.halted = Some(stint_err.to_string());
                return Err(QuicktrackError::Stint(stint_err));
            }
        }
        closing.energy_samples = next.energy.advance_to(close_secs);

        let seconds = next.stints.player_seconds();
        closing.stat_upserts = next.aggregator.set_minutes(&seconds);

        let (points_for, points_against) = next.stints.score_totals();
        if points_for != scores.us || points_against != scores.them {
            warn!(
                game_id,
                points_for,
                points_against,
                final_us = scores.us,
                final_them = scores.them,
                "stint score totals disagree with final scores"
            );
        }

        let report = next.aggregator.reconcile(scores.us, scores.them);
        if !report.matches() {
            warn!(
                game_id,
                plus_minus_sum = report.plus_minus_sum,
                expected = report.expected,
                "plus-minus reconciliation mismatch, flagging for review"
            );
        }

        let stats = next.aggregator.rows();
        let timeout = Duration::from_millis(self.config.engine.commit_timeout_ms);
        tokio::time::timeout(
            timeout,
            self.gateway.finalize_game(game_id, scores, &stats, &closing),
        )
        .await
        .map_err(|_| QuicktrackError::CommitTimeout {
            elapsed_ms: self.config.engine.commit_timeout_ms,
        })??;

        slot.state = next;
        slot.meta.completed = true;
        slot.meta.final_score_us = Some(scores.us);
        slot.meta.final_score_them = Some(scores.them);
        info!(game_id, us = scores.us, them = scores.them, "game closed");
        Ok((stats, report))
    }

    /// Rebuild all derived state for a game by folding its raw event log.
    /// Pure with respect to the engine: nothing is persisted or swapped in.
    #[instrument(skip(self))]
    pub async fn replay_game(&self, game_id: GameId) -> Result<ReplayedGame> {
        let events = self.gateway.load_events(game_id).await?;
        let mut state = GameState::new(game_id, &self.config);

        for stored in &events {
            apply_event(&mut state, &self.config, &stored.event)?;
        }

        info!(game_id, events = events.len(), "replay complete");
        Ok(ReplayedGame {
            game_id,
            events_applied: events.len(),
            stints: state.stints.stints().to_vec(),
            stats: state.aggregator.rows(),
            momentum: state.momentum.value(),
        })
    }

    /// Handle for inspecting a loaded game's in-memory state.
    pub async fn game(&self, game_id: GameId) -> Result<GameHandle> {
        Ok(GameHandle {
            slot: self.load_slot(game_id).await?,
        })
    }

    async fn load_slot(&self, game_id: GameId) -> Result<Arc<Mutex<GameSlot>>> {
        if let Some(slot) = self.games.get(&game_id) {
            return Ok(slot.clone());
        }

        let meta = self.gateway.load_game(game_id).await?;
        let mut eligible = HashSet::new();
        for player in self.roster.game_roster(game_id).await? {
            if self.roster.is_eligible(game_id, player).await? {
                eligible.insert(player);
            }
        }
        info!(game_id, roster = eligible.len(), "game loaded");

        let slot = Arc::new(Mutex::new(GameSlot {
            state: GameState::new(game_id, &self.config),
            meta,
            eligible,
            halted: None,
        }));
        // Two tasks can race the load; the first insert wins.
        Ok(self
            .games
            .entry(game_id)
            .or_insert_with(|| slot)
            .value()
            .clone())
    }

    async fn commit(
        &self,
        game_id: GameId,
        seq: i64,
        event: &SubmittedEvent,
        derived: &DerivedRows,
    ) -> Result<()> {
        let timeout = Duration::from_millis(self.config.engine.commit_timeout_ms);
        tokio::time::timeout(timeout, self.gateway.commit_event(game_id, seq, event, derived))
            .await
            .map_err(|_| QuicktrackError::CommitTimeout {
                elapsed_ms: self.config.engine.commit_timeout_ms,
            })?
    }
}

/// Apply one validated event to a game state, producing the derived rows to
/// commit. Stint invariant violations bubble up and halt the game.
fn apply_event(
    state: &mut GameState,
    config: &AppConfig,
    event: &SubmittedEvent,
) -> std::result::Result<DerivedRows, StintError> {
    let quarter_length = config.engine.quarter_length_secs;
    let now_secs = event.clock.total_seconds(quarter_length);
    let game_id = state.stints.game_id();

    let mut derived = DerivedRows::default();

    match &event.payload {
        GameEvent::LineupChange { lineup } => {
            derived.stint_upserts = state.stints.observe_lineup(now_secs, lineup.clone())?;
            derived.energy_samples = state.energy.observe_lineup(now_secs, lineup);
        }
        GameEvent::Possession {
            outcome,
            failure_type,
        } => {
            derived.energy_samples = state.energy.advance_to(now_secs);
            let lineup = state
                .stints
                .current_lineup()
                .ok_or(StintError::NoOpenStint)?
                .clone();
            state.momentum.apply(*outcome);
            derived.possessions.push(PossessionRow {
                game_id,
                quarter: event.clock.quarter,
                time_remaining_seconds: quarter_length.saturating_sub(event.clock.elapsed_seconds),
                outcome: *outcome,
                failure_type: *failure_type,
                lineup,
            });
        }
        GameEvent::DetailedPossession {
            outcome,
            failure_type,
            ball_advancement,
            shot_quality,
            shooter,
            shot_type,
            shot_result,
            points_scored,
        } => {
            derived.energy_samples = state.energy.advance_to(now_secs);
            let lineup = state
                .stints
                .current_lineup()
                .ok_or(StintError::NoOpenStint)?
                .clone();
            let momentum_state = state.momentum.apply(*outcome);

            if *points_scored > 0 {
                derived
                    .stint_upserts
                    .push(state.stints.record_score(*points_scored, true)?);
                let stat_rows = match (shooter, shot_result) {
                    (Some(shooter), Some(ShotResult::Made)) => {
                        state
                            .aggregator
                            .record_made_shot(*shooter, *points_scored, &lineup)
                    }
                    _ => state.aggregator.record_team_score(*points_scored, &lineup),
                };
                derived.stat_upserts.extend(stat_rows);
            }

            derived.detailed_possessions.push(DetailedPossessionRow {
                game_id,
                quarter: event.clock.quarter,
                time_elapsed_seconds: now_secs,
                lineup,
                ball_advancement: *ball_advancement,
                shot_quality: *shot_quality,
                shooter_id: *shooter,
                shot_type: *shot_type,
                shot_result: *shot_result,
                outcome: *outcome,
                failure_type: *failure_type,
                points_scored: *points_scored,
                momentum_state,
            });
        }
        GameEvent::Shot {
            player,
            shot_type,
            quality,
            made,
            x,
            y,
        } => {
            derived.energy_samples = state.energy.advance_to(now_secs);
            if *made {
                let points = shot_type.points();
                derived
                    .stint_upserts
                    .push(state.stints.record_score(points, true)?);
                let lineup = state
                    .stints
                    .current_lineup()
                    .expect("record_score verified an open stint")
                    .clone();
                derived
                    .stat_upserts
                    .extend(state.aggregator.record_made_shot(*player, points, &lineup));
            }
            derived.shots.push(ShotRow {
                game_id,
                player_id: *player,
                quarter: event.clock.quarter,
                time_elapsed_seconds: now_secs,
                shot_type: *shot_type,
                quality: *quality,
                made: *made,
                x: *x,
                y: *y,
            });
        }
        GameEvent::OpponentScore { points } => {
            derived.energy_samples = state.energy.advance_to(now_secs);
            derived
                .stint_upserts
                .push(state.stints.record_score(*points, false)?);
            let lineup = state
                .stints
                .current_lineup()
                .expect("record_score verified an open stint")
                .clone();
            derived
                .stat_upserts
                .extend(state.aggregator.record_opponent_score(*points, &lineup));
        }
        GameEvent::Stat { player, kind } => {
            derived.energy_samples = state.energy.advance_to(now_secs);
            derived
                .stat_upserts
                .push(state.aggregator.record_stat(*player, *kind));
        }
        GameEvent::ClockTick => {
            derived.energy_samples = state.energy.advance_to(now_secs);
        }
        GameEvent::StatCorrection {
            player,
            kind,
            delta,
        } => {
            derived.energy_samples = state.energy.advance_to(now_secs);
            derived
                .stat_upserts
                .push(state.aggregator.apply_correction(*player, *kind, *delta));
        }
    }

    state.watermark = Some(event.clock);
    state.committed_ids.insert(event.event_id);
    state.next_seq += 1;
    Ok(derived)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Lineup, PossessionModel, PossessionOutcome, ShotType, StatKind, StoredEvent};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex as StdMutex;

    /// Gateway that records commits in memory and can be told to fail.
    #[derive(Default)]
    struct MemoryGateway {
        events: StdMutex<Vec<StoredEvent>>,
        fail_commits: StdMutex<bool>,
        finalized: StdMutex<Option<FinalScores>>,
    }

    impl MemoryGateway {
        fn set_failing(&self, failing: bool) {
            *self.fail_commits.lock().unwrap() = failing;
        }
    }

    #[async_trait]
    impl PersistenceGateway for MemoryGateway {
        async fn load_game(&self, game_id: GameId) -> Result<GameMeta> {
            Ok(GameMeta {
                id: game_id,
                team_id: 1,
                date: Utc::now().date_naive(),
                opponent: "Rival HS".to_string(),
                location: crate::domain::Location::Home,
                possession_model: PossessionModel::Simple,
                final_score_us: None,
                final_score_them: None,
                completed: false,
            })
        }

        async fn commit_event(
            &self,
            game_id: GameId,
            seq: i64,
            event: &SubmittedEvent,
            _derived: &DerivedRows,
        ) -> Result<()> {
            if *self.fail_commits.lock().unwrap() {
                return Err(QuicktrackError::Internal("storage down".to_string()));
            }
            self.events.lock().unwrap().push(StoredEvent {
                game_id,
                seq,
                event: event.clone(),
                created_at: Utc::now(),
            });
            Ok(())
        }

        async fn load_events(&self, game_id: GameId) -> Result<Vec<StoredEvent>> {
            Ok(self
                .events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.game_id == game_id)
                .cloned()
                .collect())
        }

        async fn finalize_game(
            &self,
            _game_id: GameId,
            scores: FinalScores,
            _stats: &[PlayerGameStatRow],
            _closing: &DerivedRows,
        ) -> Result<()> {
            *self.finalized.lock().unwrap() = Some(scores);
            Ok(())
        }
    }

    fn engine() -> (GameEventEngine, Arc<MemoryGateway>) {
        let gateway = Arc::new(MemoryGateway::default());
        let roster = Arc::new(
            crate::gateway::StaticRoster::new().with_roster(1, 1..=10),
        );
        let engine = GameEventEngine::new(
            AppConfig::default_config("postgres://unused"),
            gateway.clone(),
            roster,
        );
        (engine, gateway)
    }

    fn lineup(ids: [PlayerId; 5]) -> Lineup {
        Lineup::new(ids).unwrap()
    }

    #[tokio::test]
    async fn test_pipeline_accepts_and_commits() {
        let (engine, gateway) = engine();

        let outcome = engine
            .submit_event(
                1,
                SubmittedEvent::new(
                    GameClock::new(1, 0),
                    GameEvent::LineupChange {
                        lineup: lineup([1, 2, 3, 4, 5]),
                    },
                ),
            )
            .await
            .unwrap();
        assert!(outcome.is_accepted());

        let outcome = engine
            .submit_event(
                1,
                SubmittedEvent::new(
                    GameClock::new(1, 30),
                    GameEvent::Shot {
                        player: 3,
                        shot_type: ShotType::ThreePoint,
                        quality: None,
                        made: true,
                        x: None,
                        y: None,
                    },
                ),
            )
            .await
            .unwrap();
        assert!(outcome.is_accepted());

        assert_eq!(gateway.events.lock().unwrap().len(), 2);
        let handle = engine.game(1).await.unwrap();
        let stats = handle.stat_rows().await;
        let shooter = stats.iter().find(|r| r.player_id == 3).unwrap();
        assert_eq!(shooter.points, 3);
    }

    #[tokio::test]
    async fn test_rejection_leaves_state_untouched() {
        let (engine, gateway) = engine();
        engine
            .submit_event(
                1,
                SubmittedEvent::new(
                    GameClock::new(2, 50),
                    GameEvent::LineupChange {
                        lineup: lineup([1, 2, 3, 4, 5]),
                    },
                ),
            )
            .await
            .unwrap();

        let outcome = engine
            .submit_event(
                1,
                SubmittedEvent::new(GameClock::new(2, 10), GameEvent::ClockTick),
            )
            .await
            .unwrap();
        match outcome {
            SubmitOutcome::Rejected { code, .. } => assert_eq!(code, "CLOCK_REGRESSION"),
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(gateway.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_previous_state() {
        let (engine, gateway) = engine();
        engine
            .submit_event(
                1,
                SubmittedEvent::new(
                    GameClock::new(1, 0),
                    GameEvent::LineupChange {
                        lineup: lineup([1, 2, 3, 4, 5]),
                    },
                ),
            )
            .await
            .unwrap();

        gateway.set_failing(true);
        let event = SubmittedEvent::new(
            GameClock::new(1, 40),
            GameEvent::Stat {
                player: 2,
                kind: StatKind::Steal,
            },
        );
        assert!(engine.submit_event(1, event.clone()).await.is_err());

        let handle = engine.game(1).await.unwrap();
        assert!(handle.stat_rows().await.iter().all(|r| r.steals == 0));

        // Same event id retries cleanly once storage recovers.
        gateway.set_failing(false);
        let outcome = engine.submit_event(1, event).await.unwrap();
        assert!(outcome.is_accepted());
    }

    #[tokio::test]
    async fn test_invariant_violation_halts_game() {
        let (engine, _) = engine();
        // Scoring before any lineup: NO_OPEN_STINT.
        let err = engine
            .submit_event(
                1,
                SubmittedEvent::new(GameClock::new(1, 10), GameEvent::OpponentScore { points: 2 }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, QuicktrackError::Stint(StintError::NoOpenStint)));

        let err = engine
            .submit_event(
                1,
                SubmittedEvent::new(GameClock::new(1, 20), GameEvent::ClockTick),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, QuicktrackError::GameHalted { .. }));
    }

    #[tokio::test]
    async fn test_close_game_reports_reconciliation() {
        let (engine, gateway) = engine();
        engine
            .submit_event(
                1,
                SubmittedEvent::new(
                    GameClock::new(1, 0),
                    GameEvent::LineupChange {
                        lineup: lineup([1, 2, 3, 4, 5]),
                    },
                ),
            )
            .await
            .unwrap();
        engine
            .submit_event(
                1,
                SubmittedEvent::new(
                    GameClock::new(1, 120),
                    GameEvent::Shot {
                        player: 1,
                        shot_type: ShotType::TwoPoint,
                        quality: None,
                        made: true,
                        x: None,
                        y: None,
                    },
                ),
            )
            .await
            .unwrap();

        let (stats, report) = engine
            .close_game(1, FinalScores { us: 2, them: 0 })
            .await
            .unwrap();
        assert!(report.matches());
        assert_eq!(
            *gateway.finalized.lock().unwrap(),
            Some(FinalScores { us: 2, them: 0 })
        );
        let row = stats.iter().find(|r| r.player_id == 1).unwrap();
        assert_eq!(row.minutes_played, rust_decimal_macros::dec!(2));

        let err = engine
            .submit_event(
                1,
                SubmittedEvent::new(GameClock::new(1, 200), GameEvent::ClockTick),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, QuicktrackError::GameCompleted(_)));
    }

    #[tokio::test]
    async fn test_replay_matches_live_state() {
        let (engine, _) = engine();
        engine
            .submit_event(
                1,
                SubmittedEvent::new(
                    GameClock::new(1, 0),
                    GameEvent::LineupChange {
                        lineup: lineup([1, 2, 3, 4, 5]),
                    },
                ),
            )
            .await
            .unwrap();
        for (secs, outcome) in [
            (30, PossessionOutcome::Good),
            (60, PossessionOutcome::Failed),
            (90, PossessionOutcome::Neutral),
        ] {
            let failure_type = (outcome == PossessionOutcome::Failed)
                .then_some(crate::domain::FailureType::Turnover);
            engine
                .submit_event(
                    1,
                    SubmittedEvent::new(
                        GameClock::new(1, secs),
                        GameEvent::Possession {
                            outcome,
                            failure_type,
                        },
                    ),
                )
                .await
                .unwrap();
        }

        let handle = engine.game(1).await.unwrap();
        let replayed = engine.replay_game(1).await.unwrap();
        assert_eq!(replayed.events_applied, 4);
        assert_eq!(replayed.momentum, handle.momentum().await);
        assert_eq!(replayed.stints, handle.stints().await);
        assert_eq!(replayed.stats, handle.stat_rows().await);
    }
}
