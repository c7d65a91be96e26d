use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub energy: EnergyConfig,
    #[serde(default)]
    pub momentum: MomentumConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub roster: RosterConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Regulation quarter length in game seconds
    #[serde(default = "default_quarter_length")]
    pub quarter_length_secs: u32,
    /// Timeout for the per-event persistence commit
    #[serde(default = "default_commit_timeout")]
    pub commit_timeout_ms: u64,
}

fn default_quarter_length() -> u32 {
    600
}

fn default_commit_timeout() -> u64 {
    5000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quarter_length_secs: 600,
            commit_timeout_ms: 5000,
        }
    }
}

/// Energy model tuning.
///
/// The original data definition only stores the results; rates are deliberate
/// choices exposed here rather than hard-coded.
#[derive(Debug, Clone, Deserialize)]
pub struct EnergyConfig {
    /// Energy lost per second of consecutive court time
    pub decay_per_second: Decimal,
    /// Energy regained per second on the bench
    pub recovery_per_second: Decimal,
    /// Minimum game seconds between appended samples for a player
    pub sample_interval_secs: u32,
    /// Energy level assigned when a player is first seen
    pub starting_level: Decimal,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            decay_per_second: dec!(0.05),
            recovery_per_second: dec!(0.10),
            sample_interval_secs: 30,
            starting_level: dec!(100),
        }
    }
}

/// Momentum calculator tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct MomentumConfig {
    /// Added on a GOOD possession
    pub good_delta: i32,
    /// Subtracted on a FAILED possession
    pub failed_delta: i32,
    /// Decay toward zero on a NEUTRAL possession
    pub neutral_decay: i32,
    /// Momentum is clamped to [-bound, +bound]
    pub bound: i32,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            good_delta: 5,
            failed_delta: 5,
            neutral_decay: 1,
            bound: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct RosterConfig {
    /// Base URL of the external roster service
    #[serde(default = "default_roster_url")]
    pub base_url: String,
    /// Request timeout in milliseconds
    #[serde(default = "default_roster_timeout")]
    pub timeout_ms: u64,
}

fn default_roster_url() -> String {
    "http://localhost:9100".to_string()
}

fn default_roster_timeout() -> u64 {
    3000
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            base_url: default_roster_url(),
            timeout_ms: default_roster_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Optional directory for non-blocking file output
    #[serde(default)]
    pub file_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("database.max_connections", 5)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("QUICKTRACK_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (QUICKTRACK_DATABASE__URL, etc.)
            .add_source(
                Environment::with_prefix("QUICKTRACK")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Create a default configuration for CLI usage
    pub fn default_config(database_url: &str) -> Self {
        Self {
            engine: EngineConfig::default(),
            energy: EnergyConfig::default(),
            momentum: MomentumConfig::default(),
            database: DatabaseConfig {
                url: database_url.to_string(),
                max_connections: 5,
            },
            roster: RosterConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
