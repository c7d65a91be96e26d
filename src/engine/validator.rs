//! Event validation.
//!
//! Every check here is side-effect-free: an event is either accepted exactly
//! as submitted or rejected with a specific reason before any state mutation.
//! Rejected events never reach the stint tracker, energy model, momentum
//! calculator or aggregator.

use std::collections::HashSet;

use uuid::Uuid;

use crate::domain::{GameClock, GameEvent, PlayerId, PossessionModel, SubmittedEvent};
use crate::error::RejectReason;

/// The game state a validation pass reads. Assembled by the engine from its
/// committed in-memory state; eligibility has already been resolved through
/// the roster provider into a flat set of player ids.
#[derive(Debug)]
pub struct ValidationContext<'a> {
    pub model: PossessionModel,
    /// Clock of the most recently committed event, if any.
    pub watermark: Option<GameClock>,
    /// Event ids already committed for this game.
    pub committed_ids: &'a HashSet<Uuid>,
    /// Players on the game roster and currently eligible.
    pub eligible: &'a HashSet<PlayerId>,
}

/// Validate a submitted event against the game's committed state.
///
/// Checks run in a fixed order (duplicate, clock, shape, roster) so a bad
/// event always reports the same reason on resubmission.
pub fn validate_event(ctx: &ValidationContext<'_>, event: &SubmittedEvent) -> Result<(), RejectReason> {
    validate_not_duplicate(ctx.committed_ids, event.event_id)?;
    validate_clock(ctx.watermark, event.clock)?;
    validate_shape(ctx.model, &event.payload)?;
    validate_players(ctx.eligible, &event.payload)?;
    Ok(())
}

fn validate_not_duplicate(
    committed: &HashSet<Uuid>,
    event_id: Uuid,
) -> Result<(), RejectReason> {
    if committed.contains(&event_id) {
        return Err(RejectReason::DuplicateEvent { event_id });
    }
    Ok(())
}

/// Equal clocks are accepted; only strict regression is rejected. Two
/// substitutions at the same timestamp are legal and produce zero-duration
/// stints in arrival order.
fn validate_clock(watermark: Option<GameClock>, clock: GameClock) -> Result<(), RejectReason> {
    if let Some(watermark) = watermark {
        if clock < watermark {
            return Err(RejectReason::ClockRegression {
                event: clock,
                watermark,
            });
        }
    }
    Ok(())
}

/// Structural checks: lineup size and possession-model consistency.
fn validate_shape(model: PossessionModel, payload: &GameEvent) -> Result<(), RejectReason> {
    match payload {
        GameEvent::LineupChange { lineup } => {
            // Lineup::new enforces this, but deserialized payloads do not go
            // through the constructor.
            if lineup.len() != 5 {
                return Err(RejectReason::InvalidLineupSize { got: lineup.len() });
            }
        }
        GameEvent::Possession { outcome, failure_type } => {
            if model != PossessionModel::Simple {
                return Err(RejectReason::ModelMismatch {
                    detail: format!(
                        "simple possession submitted to a {} game",
                        model
                    ),
                });
            }
            validate_failure_pairing(*outcome, failure_type.is_some())?;
        }
        GameEvent::DetailedPossession {
            outcome,
            failure_type,
            shooter,
            shot_type,
            shot_result,
            points_scored,
            ..
        } => {
            if model != PossessionModel::Detailed {
                return Err(RejectReason::ModelMismatch {
                    detail: format!(
                        "detailed possession submitted to a {} game",
                        model
                    ),
                });
            }
            validate_failure_pairing(*outcome, failure_type.is_some())?;
            if shot_result.is_some() && (shooter.is_none() || shot_type.is_none()) {
                return Err(RejectReason::ModelMismatch {
                    detail: "shot_result requires shooter and shot_type".to_string(),
                });
            }
            if *points_scored < 0 {
                return Err(RejectReason::ModelMismatch {
                    detail: format!("negative points_scored: {}", points_scored),
                });
            }
        }
        GameEvent::OpponentScore { points } => {
            if *points <= 0 {
                return Err(RejectReason::ModelMismatch {
                    detail: format!("opponent score must be positive, got {}", points),
                });
            }
        }
        GameEvent::StatCorrection { delta, .. } => {
            if *delta == 0 {
                return Err(RejectReason::ModelMismatch {
                    detail: "correction with zero delta".to_string(),
                });
            }
        }
        GameEvent::Shot { .. } | GameEvent::Stat { .. } | GameEvent::ClockTick => {}
    }
    Ok(())
}

fn validate_failure_pairing(
    outcome: crate::domain::PossessionOutcome,
    has_failure_type: bool,
) -> Result<(), RejectReason> {
    use crate::domain::PossessionOutcome::*;
    match (outcome, has_failure_type) {
        (Failed, false) => Err(RejectReason::ModelMismatch {
            detail: "FAILED possession without a failure_type".to_string(),
        }),
        (Good | Neutral, true) => Err(RejectReason::ModelMismatch {
            detail: format!("failure_type on a {} possession", outcome),
        }),
        _ => Ok(()),
    }
}

fn validate_players(
    eligible: &HashSet<PlayerId>,
    payload: &GameEvent,
) -> Result<(), RejectReason> {
    for player_id in payload.referenced_players() {
        if !eligible.contains(&player_id) {
            return Err(RejectReason::UnknownPlayer { player_id });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FailureType, Lineup, PossessionOutcome, StatKind};

    fn ctx<'a>(
        model: PossessionModel,
        watermark: Option<GameClock>,
        committed: &'a HashSet<Uuid>,
        eligible: &'a HashSet<PlayerId>,
    ) -> ValidationContext<'a> {
        ValidationContext {
            model,
            watermark,
            committed_ids: committed,
            eligible,
        }
    }

    fn roster() -> HashSet<PlayerId> {
        (1..=10).collect()
    }

    #[test]
    fn test_clock_regression_rejected() {
        let committed = HashSet::new();
        let eligible = roster();
        let ctx = ctx(
            PossessionModel::Simple,
            Some(GameClock::new(2, 50)),
            &committed,
            &eligible,
        );
        let event = SubmittedEvent::new(GameClock::new(2, 10), GameEvent::ClockTick);
        let err = validate_event(&ctx, &event).unwrap_err();
        assert!(matches!(err, RejectReason::ClockRegression { .. }));
        assert_eq!(err.code(), "CLOCK_REGRESSION");
    }

    #[test]
    fn test_equal_clock_accepted() {
        let committed = HashSet::new();
        let eligible = roster();
        let ctx = ctx(
            PossessionModel::Simple,
            Some(GameClock::new(2, 50)),
            &committed,
            &eligible,
        );
        let event = SubmittedEvent::new(GameClock::new(2, 50), GameEvent::ClockTick);
        assert!(validate_event(&ctx, &event).is_ok());
    }

    #[test]
    fn test_duplicate_event_rejected() {
        let eligible = roster();
        let event = SubmittedEvent::new(GameClock::new(1, 0), GameEvent::ClockTick);
        let committed: HashSet<Uuid> = [event.event_id].into_iter().collect();
        let ctx = ctx(PossessionModel::Simple, None, &committed, &eligible);
        assert!(matches!(
            validate_event(&ctx, &event),
            Err(RejectReason::DuplicateEvent { .. })
        ));
    }

    #[test]
    fn test_model_mismatch() {
        let committed = HashSet::new();
        let eligible = roster();
        let ctx = ctx(PossessionModel::Detailed, None, &committed, &eligible);
        let event = SubmittedEvent::new(
            GameClock::new(1, 10),
            GameEvent::Possession {
                outcome: PossessionOutcome::Good,
                failure_type: None,
            },
        );
        assert!(matches!(
            validate_event(&ctx, &event),
            Err(RejectReason::ModelMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_player_rejected() {
        let committed = HashSet::new();
        let eligible = roster();
        let ctx = ctx(PossessionModel::Simple, None, &committed, &eligible);
        let event = SubmittedEvent::new(
            GameClock::new(1, 10),
            GameEvent::Stat {
                player: 99,
                kind: StatKind::Assist,
            },
        );
        assert!(matches!(
            validate_event(&ctx, &event),
            Err(RejectReason::UnknownPlayer { player_id: 99 })
        ));
    }

    #[test]
    fn test_failed_possession_requires_failure_type() {
        let committed = HashSet::new();
        let eligible = roster();
        let ctx = ctx(PossessionModel::Simple, None, &committed, &eligible);
        let missing = SubmittedEvent::new(
            GameClock::new(1, 10),
            GameEvent::Possession {
                outcome: PossessionOutcome::Failed,
                failure_type: None,
            },
        );
        assert!(validate_event(&ctx, &missing).is_err());

        let good_with_failure = SubmittedEvent::new(
            GameClock::new(1, 10),
            GameEvent::Possession {
                outcome: PossessionOutcome::Good,
                failure_type: Some(FailureType::Turnover),
            },
        );
        assert!(validate_event(&ctx, &good_with_failure).is_err());

        let ok = SubmittedEvent::new(
            GameClock::new(1, 10),
            GameEvent::Possession {
                outcome: PossessionOutcome::Failed,
                failure_type: Some(FailureType::ShotSelection),
            },
        );
        assert!(validate_event(&ctx, &ok).is_ok());
    }

    #[test]
    fn test_lineup_change_valid() {
        let committed = HashSet::new();
        let eligible = roster();
        let ctx = ctx(PossessionModel::Simple, None, &committed, &eligible);
        let event = SubmittedEvent::new(
            GameClock::new(1, 0),
            GameEvent::LineupChange {
                lineup: Lineup::new([1, 2, 3, 4, 5]).unwrap(),
            },
        );
        assert!(validate_event(&ctx, &event).is_ok());
    }

    #[test]
    fn test_lineup_with_offroster_player_rejected() {
        let committed = HashSet::new();
        let eligible = roster();
        let ctx = ctx(PossessionModel::Simple, None, &committed, &eligible);
        let event = SubmittedEvent::new(
            GameClock::new(1, 0),
            GameEvent::LineupChange {
                lineup: Lineup::new([1, 2, 3, 4, 50]).unwrap(),
            },
        );
        assert!(matches!(
            validate_event(&ctx, &event),
            Err(RejectReason::UnknownPlayer { player_id: 50 })
        ));
    }
}
