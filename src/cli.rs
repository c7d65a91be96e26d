//! Command-line surface: migrations, game setup, event ingestion and the
//! post-game reports.

use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::adapters::{HttpRosterProvider, PostgresStore};
use crate::config::{AppConfig, LoggingConfig};
use crate::domain::{FinalScores, GameId, Location, PlayerId, PossessionModel, SubmitOutcome};
use crate::engine::GameEventEngine;
use crate::error::{QuicktrackError, Result};
use crate::gateway::{RosterProvider, StaticRoster};

#[derive(Parser)]
#[command(name = "quicktrack")]
#[command(author = "QuickTrack Team")]
#[command(version = "0.1.0")]
#[command(about = "Basketball game event processing and analytics engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config directory (default.toml plus QUICKTRACK_ENV overrides)
    #[arg(short, long, default_value = "config")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run database migrations
    Migrate,
    /// Create a game and print its id
    CreateGame {
        #[arg(long)]
        team_id: i64,
        /// Game date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        opponent: String,
        /// HOME or AWAY
        #[arg(long, default_value = "HOME")]
        location: String,
        /// Possession model: simple or detailed
        #[arg(long, default_value = "simple")]
        model: String,
    },
    /// Feed a JSON-lines event file through the engine
    Ingest {
        #[arg(long)]
        game_id: GameId,
        /// Path to the event file, one JSON event per line
        file: String,
        /// Comma-separated player ids; bypasses the roster service
        #[arg(long)]
        roster: Option<String>,
        /// Close the game afterwards with final scores "us:them"
        #[arg(long)]
        close: Option<String>,
    },
    /// Close a game with its final scores
    Close {
        #[arg(long)]
        game_id: GameId,
        /// Final scores as "us:them"
        scores: String,
        /// Comma-separated player ids; bypasses the roster service
        #[arg(long)]
        roster: Option<String>,
    },
    /// Rebuild derived state from the stored event log and print it
    Replay {
        #[arg(long)]
        game_id: GameId,
    },
    /// Failure-type breakdown over failed possessions
    Constraint {
        #[arg(long)]
        game_id: GameId,
    },
    /// Shooting splits per player, shot type and quality
    Shooting {
        #[arg(long)]
        game_id: GameId,
    },
    /// Possession production per lineup
    Lineups {
        #[arg(long)]
        game_id: GameId,
    },
}

/// Full logging setup for ingest and engine runs: env-filtered console
/// output plus an optional daily-rotated file appender.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},quicktrack=debug,sqlx=warn", config.level))
    });

    // tracing_appender::rolling::daily panics if it cannot create the
    // initial log file, and this binary aborts on panic. Preflight
    // writability before handing it the directory.
    fn build_file_layer<S>(config: &LoggingConfig) -> Option<impl tracing_subscriber::Layer<S>>
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        config.file_dir.as_deref().and_then(|log_dir| {
            if std::fs::create_dir_all(log_dir).is_err() {
                eprintln!("Warning: could not create log directory {}, file logging disabled", log_dir);
                return None;
            }
            let test_path = std::path::Path::new(log_dir).join(".quicktrack_write_test");
            match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&test_path)
            {
                Ok(_) => {
                    let _ = std::fs::remove_file(&test_path);
                    let file_appender = tracing_appender::rolling::daily(log_dir, "quicktrack.log");
                    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                    // Keep the guard alive for the life of the process
                    Box::leak(Box::new(guard));
                    Some(
                        tracing_subscriber::fmt::layer()
                            .with_writer(non_blocking)
                            .with_ansi(false)
                            .with_target(true),
                    )
                }
                Err(e) => {
                    eprintln!(
                        "Warning: could not write to log directory {} ({}), file logging disabled",
                        log_dir, e
                    );
                    None
                }
            }
        })
    }

    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .with(build_file_layer(config))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .with(build_file_layer(config))
            .init();
    }
}

/// Minimal logging for one-shot report commands
pub fn init_logging_simple() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load_from(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: failed to load config ({}), using defaults", e);
        AppConfig::default_config("postgres://localhost/quicktrack")
    });

    match cli.command {
        Commands::Migrate => {
            init_logging_simple();
            let store = connect(&config).await?;
            store.migrate().await?;
            println!("migrations applied");
        }
        Commands::CreateGame {
            team_id,
            date,
            opponent,
            location,
            model,
        } => {
            init_logging_simple();
            let location =
                Location::try_from(location.as_str()).map_err(QuicktrackError::Internal)?;
            let model =
                PossessionModel::try_from(model.as_str()).map_err(QuicktrackError::Internal)?;
            let store = connect(&config).await?;
            let game_id = store
                .create_game(team_id, date, &opponent, location, model)
                .await?;
            println!("created game {}", game_id);
        }
        Commands::Ingest {
            game_id,
            file,
            roster,
            close,
        } => {
            init_logging(&config.logging);
            let store = connect(&config).await?;
            let provider = roster_provider(&config, game_id, roster.as_deref())?;
            let engine = GameEventEngine::new(config, Arc::new(store), provider);
            run_ingest(&engine, game_id, &file).await?;
            if let Some(scores) = close {
                run_close(&engine, game_id, &scores).await?;
            }
        }
        Commands::Close {
            game_id,
            scores,
            roster,
        } => {
            init_logging(&config.logging);
            let store = connect(&config).await?;
            let provider = roster_provider(&config, game_id, roster.as_deref())?;
            let engine = GameEventEngine::new(config, Arc::new(store), provider);
            run_close(&engine, game_id, &scores).await?;
        }
        Commands::Replay { game_id } => {
            init_logging_simple();
            let store = connect(&config).await?;
            let roster: Arc<dyn RosterProvider> = Arc::new(StaticRoster::new());
            let engine = GameEventEngine::new(config, Arc::new(store), roster);
            let replayed = engine.replay_game(game_id).await?;
            println!(
                "game {}: {} events, momentum {}",
                replayed.game_id, replayed.events_applied, replayed.momentum
            );
            println!("\nStints:");
            for stint in &replayed.stints {
                println!(
                    "  #{} {} {}s-{} +{} -{}",
                    stint.stint_no,
                    stint.lineup,
                    stint.start_time_seconds,
                    stint
                        .end_time_seconds
                        .map(|t| format!("{}s", t))
                        .unwrap_or_else(|| "open".to_string()),
                    stint.points_for,
                    stint.points_against
                );
            }
            println!("\nPlayer stats:");
            for row in &replayed.stats {
                println!(
                    "  player {}: {} pts, {} ast, {} reb, {:+} +/-, {} min",
                    row.player_id,
                    row.points,
                    row.assists,
                    row.rebounds_total(),
                    row.plus_minus,
                    row.minutes_played
                );
            }
        }
        Commands::Constraint { game_id } => {
            init_logging_simple();
            let store = connect(&config).await?;
            let rows = store.constraint_analysis(game_id).await?;
            if rows.is_empty() {
                println!("no failed possessions recorded for game {}", game_id);
            } else {
                println!("Failed possessions by type (most frequent first):");
                for (failure_type, count) in rows {
                    println!("  {:20} {}", failure_type, count);
                }
            }
        }
        Commands::Shooting { game_id } => {
            init_logging_simple();
            let store = connect(&config).await?;
            println!("Shooting splits:");
            for (player, shot_type, quality, attempts, makes) in
                store.shooting_splits(game_id).await?
            {
                let pct = if attempts > 0 {
                    makes as f64 * 100.0 / attempts as f64
                } else {
                    0.0
                };
                println!(
                    "  player {:4} {:3} {:10} {}/{} ({:.1}%)",
                    player,
                    shot_type,
                    quality.unwrap_or_else(|| "-".to_string()),
                    makes,
                    attempts,
                    pct
                );
            }
        }
        Commands::Lineups { game_id } => {
            init_logging_simple();
            let store = connect(&config).await?;
            println!("Lineup production (detailed possessions):");
            for (lineup, possessions, scores, total_points) in
                store.lineup_performance(game_id).await?
            {
                println!(
                    "  {} {} poss, {} scoring, {} pts",
                    lineup, possessions, scores, total_points
                );
            }
        }
    }

    Ok(())
}

async fn connect(config: &AppConfig) -> Result<PostgresStore> {
    PostgresStore::new(&config.database.url, config.database.max_connections).await
}

fn roster_provider(
    config: &AppConfig,
    game_id: GameId,
    roster_override: Option<&str>,
) -> Result<Arc<dyn RosterProvider>> {
    match roster_override {
        Some(spec) => {
            let players = parse_roster(spec)?;
            info!(game_id, players = players.len(), "using inline roster");
            Ok(Arc::new(StaticRoster::new().with_roster(game_id, players)))
        }
        None => Ok(Arc::new(HttpRosterProvider::new(&config.roster)?)),
    }
}

fn parse_roster(spec: &str) -> Result<Vec<PlayerId>> {
    spec.split(',')
        .map(|part| {
            part.trim()
                .parse::<PlayerId>()
                .map_err(|_| QuicktrackError::Internal(format!("bad player id: {:?}", part)))
        })
        .collect()
}

fn parse_scores(spec: &str) -> Result<FinalScores> {
    let (us, them) = spec
        .split_once(':')
        .ok_or_else(|| QuicktrackError::Internal(format!("scores must be us:them, got {:?}", spec)))?;
    Ok(FinalScores {
        us: us
            .trim()
            .parse()
            .map_err(|_| QuicktrackError::Internal(format!("bad score: {:?}", us)))?,
        them: them
            .trim()
            .parse()
            .map_err(|_| QuicktrackError::Internal(format!("bad score: {:?}", them)))?,
    })
}

async fn run_ingest(engine: &GameEventEngine, game_id: GameId, file: &str) -> Result<()> {
    let content = std::fs::read_to_string(file)?;

    let mut accepted = 0usize;
    let mut rejected = 0usize;
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Operator-authored files may omit event_id; assign one so retries
        // of the same file line stay idempotent within this run only.
        let mut value: serde_json::Value = serde_json::from_str(line)?;
        if value.get("event_id").is_none() {
            if let Some(map) = value.as_object_mut() {
                map.insert(
                    "event_id".to_string(),
                    serde_json::Value::String(uuid::Uuid::new_v4().to_string()),
                );
            }
        }
        let event = serde_json::from_value(value)?;

        match engine.submit_event(game_id, event).await? {
            SubmitOutcome::Accepted { seq, .. } => {
                accepted += 1;
                info!(game_id, seq, line = line_no + 1, "accepted");
            }
            SubmitOutcome::Rejected { code, detail, .. } => {
                rejected += 1;
                warn!(game_id, code = %code, line = line_no + 1, "rejected: {}", detail);
            }
        }
    }

    println!("ingested {} events ({} rejected)", accepted, rejected);
    Ok(())
}

async fn run_close(engine: &GameEventEngine, game_id: GameId, scores: &str) -> Result<()> {
    let scores = parse_scores(scores)?;
    let (stats, report) = engine.close_game(game_id, scores).await?;

    println!("game {} closed {}:{}", game_id, scores.us, scores.them);
    if report.matches() {
        println!("plus-minus reconciliation OK ({})", report.plus_minus_sum);
    } else {
        println!(
            "plus-minus reconciliation MISMATCH: sum {} expected {}",
            report.plus_minus_sum, report.expected
        );
    }
    for row in &stats {
        println!(
            "  player {}: {} pts, {:+} +/-, {} min",
            row.player_id, row.points, row.plus_minus, row.minutes_played
        );
    }
    Ok(())
}
