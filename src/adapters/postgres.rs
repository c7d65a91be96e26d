use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::Row;
use tracing::{debug, info, instrument};

use crate::domain::{
    DerivedRows, FinalScores, GameClock, GameId, GameMeta, Lineup, Location, PlayerGameStatRow,
    PossessionModel, StoredEvent, SubmittedEvent,
};
use crate::error::{QuicktrackError, Result};
use crate::gateway::PersistenceGateway;

/// PostgreSQL storage adapter
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a store from an existing connection pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ==================== Games ====================

    /// Create a game row. The possession model is fixed here and every
    /// possession event for the game must match it.
    #[instrument(skip(self))]
    pub async fn create_game(
        &self,
        team_id: i64,
        date: chrono::NaiveDate,
        opponent: &str,
        location: Location,
        model: PossessionModel,
    ) -> Result<GameId> {
        let row = sqlx::query(
            r#"
            INSERT INTO games (team_id, date, opponent, location, possession_model, completed)
            VALUES ($1, $2, $3, $4, $5, FALSE)
            RETURNING id
            "#,
        )
        .bind(team_id)
        .bind(date)
        .bind(opponent)
        .bind(location.as_str())
        .bind(model.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("id"))
    }

    // ==================== Analytics ====================

    /// Failure-type counts over FAILED possessions under both models,
    /// most frequent first.
    pub async fn constraint_analysis(&self, game_id: GameId) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT failure_type, COUNT(*) AS count FROM (
                SELECT failure_type FROM possessions
                WHERE game_id = $1 AND outcome = 'FAILED' AND failure_type IS NOT NULL
                UNION ALL
                SELECT failure_type FROM detailed_possessions
                WHERE game_id = $1 AND outcome = 'FAILED' AND failure_type IS NOT NULL
            ) f
            GROUP BY failure_type
            ORDER BY count DESC, failure_type
            "#,
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| (r.get("failure_type"), r.get("count")))
            .collect())
    }

    /// Attempts and makes per player, shot type and quality.
    pub async fn shooting_splits(
        &self,
        game_id: GameId,
    ) -> Result<Vec<(i64, String, Option<String>, i64, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT player_id, shot_type, quality,
                   COUNT(*) AS attempts,
                   SUM(CASE WHEN made THEN 1 ELSE 0 END) AS makes
            FROM shots
            WHERE game_id = $1
            GROUP BY player_id, shot_type, quality
            ORDER BY player_id, shot_type
            "#,
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                (
                    r.get("player_id"),
                    r.get("shot_type"),
                    r.get("quality"),
                    r.get("attempts"),
                    r.get("makes"),
                )
            })
            .collect())
    }

    /// Possession counts, scoring possessions and points per lineup over
    /// detailed possessions. Lineups are stored as sorted arrays, so JSONB
    /// equality is set equality.
    pub async fn lineup_performance(
        &self,
        game_id: GameId,
    ) -> Result<Vec<(Lineup, i64, i64, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT lineup,
                   COUNT(*) AS possessions,
                   SUM(CASE WHEN points_scored > 0 THEN 1 ELSE 0 END) AS scores,
                   SUM(points_scored) AS total_points
            FROM detailed_possessions
            WHERE game_id = $1
            GROUP BY lineup
            ORDER BY total_points DESC
            "#,
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                let Json(lineup): Json<Lineup> = r.get("lineup");
                (
                    lineup,
                    r.get("possessions"),
                    r.get("scores"),
                    r.get("total_points"),
                )
            })
            .collect())
    }
}

#[async_trait]
impl PersistenceGateway for PostgresStore {
    async fn load_game(&self, game_id: GameId) -> Result<GameMeta> {
        let row = sqlx::query(
            r#"
            SELECT id, team_id, date, opponent, location, possession_model,
                   final_score_us, final_score_them, completed
            FROM games WHERE id = $1
            "#,
        )
        .bind(game_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| QuicktrackError::GameNotFound(game_id.to_string()))?;

        let location: String = row.get("location");
        let model: String = row.get("possession_model");
        Ok(GameMeta {
            id: row.get("id"),
            team_id: row.get("team_id"),
            date: row.get("date"),
            opponent: row.get("opponent"),
            location: Location::try_from(location.as_str()).map_err(QuicktrackError::Internal)?,
            possession_model: PossessionModel::try_from(model.as_str())
                .map_err(QuicktrackError::Internal)?,
            final_score_us: row.get("final_score_us"),
            final_score_them: row.get("final_score_them"),
            completed: row.get("completed"),
        })
    }

    #[instrument(skip(self, event, derived), fields(event_id = %event.event_id))]
    async fn commit_event(
        &self,
        game_id: GameId,
        seq: i64,
        event: &SubmittedEvent,
        derived: &DerivedRows,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO game_events (game_id, seq, event_id, quarter, elapsed_seconds, payload)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(game_id)
        .bind(seq)
        .bind(event.event_id)
        .bind(event.clock.quarter as i32)
        .bind(event.clock.elapsed_seconds as i32)
        .bind(Json(&event.payload))
        .execute(&mut *tx)
        .await?;

        for p in &derived.possessions {
            sqlx::query(
                r#"
                INSERT INTO possessions (game_id, quarter, time_remaining, outcome, failure_type, lineup)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(p.game_id)
            .bind(p.quarter as i32)
            .bind(p.time_remaining_seconds as i32)
            .bind(p.outcome.as_str())
            .bind(p.failure_type.map(|f| f.as_str()))
            .bind(Json(&p.lineup))
            .execute(&mut *tx)
            .await?;
        }

        for p in &derived.detailed_possessions {
            sqlx::query(
                r#"
                INSERT INTO detailed_possessions
                    (game_id, quarter, time_elapsed_seconds, lineup, ball_advancement,
                     shot_quality, shooter_id, shot_type, shot_result, outcome,
                     failure_type, points_scored, momentum_state)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                "#,
            )
            .bind(p.game_id)
            .bind(p.quarter as i32)
            .bind(p.time_elapsed_seconds as i32)
            .bind(Json(&p.lineup))
            .bind(p.ball_advancement.as_str())
            .bind(p.shot_quality.map(|q| q.as_str()))
            .bind(p.shooter_id)
            .bind(p.shot_type.map(|t| t.as_str()))
            .bind(p.shot_result.map(|r| r.as_str()))
            .bind(p.outcome.as_str())
            .bind(p.failure_type.map(|f| f.as_str()))
            .bind(p.points_scored)
            .bind(p.momentum_state)
            .execute(&mut *tx)
            .await?;
        }

        for s in &derived.shots {
            sqlx::query(
                r#"
                INSERT INTO shots (game_id, player_id, quarter, time_elapsed_seconds,
                                   shot_type, quality, made, x, y)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(s.game_id)
            .bind(s.player_id)
            .bind(s.quarter as i32)
            .bind(s.time_elapsed_seconds as i32)
            .bind(s.shot_type.as_str())
            .bind(s.quality.map(|q| q.as_str()))
            .bind(s.made)
            .bind(s.x)
            .bind(s.y)
            .execute(&mut *tx)
            .await?;
        }

        for stint in &derived.stint_upserts {
            upsert_stint(&mut tx, stint).await?;
        }

        for sample in &derived.energy_samples {
            insert_energy_sample(&mut tx, sample).await?;
        }

        for stat in &derived.stat_upserts {
            upsert_player_stats(&mut tx, stat).await?;
        }

        tx.commit().await?;
        debug!(game_id, seq, "event batch committed");
        Ok(())
    }

    async fn load_events(&self, game_id: GameId) -> Result<Vec<StoredEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT game_id, seq, event_id, quarter, elapsed_seconds, payload, created_at
            FROM game_events
            WHERE game_id = $1
            ORDER BY seq
            "#,
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let Json(payload) = row.get("payload");
            events.push(StoredEvent {
                game_id: row.get("game_id"),
                seq: row.get("seq"),
                event: SubmittedEvent {
                    event_id: row.get("event_id"),
                    clock: GameClock::new(
                        row.get::<i32, _>("quarter") as u32,
                        row.get::<i32, _>("elapsed_seconds") as u32,
                    ),
                    payload,
                },
                created_at: row.get("created_at"),
            });
        }
        Ok(events)
    }

    #[instrument(skip(self, stats, closing))]
    async fn finalize_game(
        &self,
        game_id: GameId,
        scores: FinalScores,
        stats: &[PlayerGameStatRow],
        closing: &DerivedRows,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE games
            SET final_score_us = $2, final_score_them = $3, completed = TRUE
            WHERE id = $1
            "#,
        )
        .bind(game_id)
        .bind(scores.us)
        .bind(scores.them)
        .execute(&mut *tx)
        .await?;

        for stint in &closing.stint_upserts {
            upsert_stint(&mut tx, stint).await?;
        }
        for sample in &closing.energy_samples {
            insert_energy_sample(&mut tx, sample).await?;
        }
        for stat in stats {
            upsert_player_stats(&mut tx, stat).await?;
        }

        tx.commit().await?;
        info!(game_id, us = scores.us, them = scores.them, "game finalized");
        Ok(())
    }
}

async fn insert_energy_sample(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    sample: &crate::domain::EnergySampleRow,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO player_energy_log (game_id, player_id, time_elapsed_seconds, energy_level)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(sample.game_id)
    .bind(sample.player_id)
    .bind(sample.time_elapsed_seconds as i32)
    .bind(sample.energy_level)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn upsert_stint(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    stint: &crate::domain::LineupStintRow,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO lineup_stints
            (game_id, stint_no, lineup, start_time_seconds, end_time_seconds,
             duration_seconds, points_for, points_against)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (game_id, stint_no) DO UPDATE SET
            end_time_seconds = EXCLUDED.end_time_seconds,
            duration_seconds = EXCLUDED.duration_seconds,
            points_for = EXCLUDED.points_for,
            points_against = EXCLUDED.points_against
        "#,
    )
    .bind(stint.game_id)
    .bind(stint.stint_no)
    .bind(Json(&stint.lineup))
    .bind(stint.start_time_seconds as i32)
    .bind(stint.end_time_seconds.map(|t| t as i32))
    .bind(stint.duration_seconds.map(|t| t as i32))
    .bind(stint.points_for)
    .bind(stint.points_against)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn upsert_player_stats(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    stat: &PlayerGameStatRow,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO player_game_stats
            (game_id, player_id, minutes_played, points, assists, rebounds_offensive,
             rebounds_defensive, turnovers, steals, blocks, fouls, plus_minus)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (game_id, player_id) DO UPDATE SET
            minutes_played = EXCLUDED.minutes_played,
            points = EXCLUDED.points,
            assists = EXCLUDED.assists,
            rebounds_offensive = EXCLUDED.rebounds_offensive,
            rebounds_defensive = EXCLUDED.rebounds_defensive,
            turnovers = EXCLUDED.turnovers,
            steals = EXCLUDED.steals,
            blocks = EXCLUDED.blocks,
            fouls = EXCLUDED.fouls,
            plus_minus = EXCLUDED.plus_minus
        "#,
    )
    .bind(stat.game_id)
    .bind(stat.player_id)
    .bind(stat.minutes_played)
    .bind(stat.points)
    .bind(stat.assists)
    .bind(stat.rebounds_offensive)
    .bind(stat.rebounds_defensive)
    .bind(stat.turnovers)
    .bind(stat.steals)
    .bind(stat.blocks)
    .bind(stat.fouls)
    .bind(stat.plus_minus)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
