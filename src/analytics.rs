//! Post-hoc analytics over persisted rows.
//!
//! Pure functions over row slices; the Postgres adapter exposes matching
//! SQL for the same reports so callers can compute either in-process (after
//! a replay) or against the database. The headline report is the constraint
//! analysis: the failure type where most possessions break down is the
//! thing to practice next.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{
    DetailedPossessionRow, FailureType, Lineup, PlayerGameStatRow, PlayerId, PossessionOutcome,
    PossessionRow, ShotQuality, ShotRow, ShotType,
};

/// Failure-type counts over FAILED possessions, most frequent first.
pub fn constraint_analysis(
    simple: &[PossessionRow],
    detailed: &[DetailedPossessionRow],
) -> Vec<(FailureType, u32)> {
    let mut counts: BTreeMap<&'static str, (FailureType, u32)> = BTreeMap::new();
    let failures = simple
        .iter()
        .filter(|p| p.outcome == PossessionOutcome::Failed)
        .filter_map(|p| p.failure_type)
        .chain(
            detailed
                .iter()
                .filter(|p| p.outcome == PossessionOutcome::Failed)
                .filter_map(|p| p.failure_type),
        );
    for failure in failures {
        counts.entry(failure.as_str()).or_insert((failure, 0)).1 += 1;
    }
    let mut out: Vec<(FailureType, u32)> = counts.into_values().collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.as_str().cmp(b.0.as_str())));
    out
}

/// Share of GOOD and FAILED possessions over the total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyReport {
    pub total: u32,
    pub good: u32,
    pub neutral: u32,
    pub failed: u32,
    pub efficiency: Decimal,
    pub waste_rate: Decimal,
}

pub fn possession_efficiency(outcomes: impl IntoIterator<Item = PossessionOutcome>) -> EfficiencyReport {
    let mut total = 0u32;
    let mut good = 0u32;
    let mut neutral = 0u32;
    let mut failed = 0u32;
    for outcome in outcomes {
        total += 1;
        match outcome {
            PossessionOutcome::Good => good += 1,
            PossessionOutcome::Neutral => neutral += 1,
            PossessionOutcome::Failed => failed += 1,
        }
    }
    let ratio = |n: u32| {
        if total == 0 {
            Decimal::ZERO
        } else {
            Decimal::from(n) / Decimal::from(total)
        }
    };
    EfficiencyReport {
        total,
        good,
        neutral,
        failed,
        efficiency: ratio(good),
        waste_rate: ratio(failed),
    }
}

/// Per-lineup production over detailed possessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineupPerformance {
    pub lineup: Lineup,
    pub possessions: u32,
    pub scores: u32,
    pub total_points: i32,
}

pub fn lineup_performance(detailed: &[DetailedPossessionRow]) -> Vec<LineupPerformance> {
    let mut by_lineup: BTreeMap<Vec<PlayerId>, LineupPerformance> = BTreeMap::new();
    for row in detailed {
        let entry = by_lineup
            .entry(row.lineup.to_vec())
            .or_insert_with(|| LineupPerformance {
                lineup: row.lineup.clone(),
                possessions: 0,
                scores: 0,
                total_points: 0,
            });
        entry.possessions += 1;
        if row.points_scored > 0 {
            entry.scores += 1;
        }
        entry.total_points += row.points_scored;
    }
    let mut out: Vec<LineupPerformance> = by_lineup.into_values().collect();
    out.sort_by(|a, b| b.total_points.cmp(&a.total_points));
    out
}

/// Attempts, makes and FG% per player, shot type and quality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShootingSplit {
    pub player_id: PlayerId,
    pub shot_type: ShotType,
    pub quality: Option<ShotQuality>,
    pub attempts: u32,
    pub makes: u32,
    pub fg_pct: Decimal,
}

pub fn shooting_splits(shots: &[ShotRow]) -> Vec<ShootingSplit> {
    type Key = (PlayerId, &'static str, Option<&'static str>);
    let mut by_key: BTreeMap<Key, ShootingSplit> = BTreeMap::new();
    for shot in shots {
        let key = (
            shot.player_id,
            shot.shot_type.as_str(),
            shot.quality.map(|q| q.as_str()),
        );
        let entry = by_key.entry(key).or_insert_with(|| ShootingSplit {
            player_id: shot.player_id,
            shot_type: shot.shot_type,
            quality: shot.quality,
            attempts: 0,
            makes: 0,
            fg_pct: Decimal::ZERO,
        });
        entry.attempts += 1;
        if shot.made {
            entry.makes += 1;
        }
    }
    let mut out: Vec<ShootingSplit> = by_key.into_values().collect();
    for split in &mut out {
        split.fg_pct = Decimal::from(split.makes * 100) / Decimal::from(split.attempts);
    }
    out
}

/// Net impact rating: points + 2*assists + rebounds + steals - 2*turnovers
/// - fouls. Blocks deliberately excluded; they are already reflected in the
/// opponent's missed shots.
pub fn net_impact(stats: &PlayerGameStatRow) -> i32 {
    stats.points + 2 * stats.assists + stats.rebounds_total() + stats.steals
        - 2 * stats.turnovers
        - stats.fouls
}

/// Net impact normalized per 10 minutes of floor time. None when the player
/// logged no minutes.
pub fn net_impact_per_10(stats: &PlayerGameStatRow) -> Option<Decimal> {
    if stats.minutes_played <= Decimal::ZERO {
        return None;
    }
    Some(Decimal::from(net_impact(stats)) / stats.minutes_played * Decimal::from(10))
}
