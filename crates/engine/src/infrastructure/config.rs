//! Engine configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use wyrmhold_domain::DailyReset;

use crate::infrastructure::retry::RetryConfig;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// SQLite database file holding player state.
    pub player_db: String,
    /// Master-data JSON; empty master data when unset.
    pub master_data_path: Option<PathBuf>,
    /// How long a started dungeon run stays readable.
    pub dungeon_expiry: Duration,
    /// Interval of the session cache sweep.
    pub session_cleanup_interval: Duration,
    pub daily_reset: DailyReset,
    pub retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            player_db: "players.db".into(),
            master_data_path: None,
            dungeon_expiry: Duration::from_secs(30 * 60),
            session_cleanup_interval: Duration::from_secs(60),
            daily_reset: DailyReset::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the process environment.
    ///
    /// Optional (with defaults):
    /// - `PLAYER_DB`: SQLite path (default: players.db)
    /// - `MASTER_DATA_PATH`: master-data JSON file (default: none)
    /// - `DUNGEON_EXPIRY_MINUTES` (default: 30)
    /// - `SESSION_CLEANUP_SECONDS` (default: 60)
    /// - `DAILY_RESET_HOUR_UTC` (default: 6)
    /// - `GRANT_MAX_RETRIES` (default: 3)
    /// - `GRANT_RETRY_BASE_DELAY_MS` (default: 50)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let positive = "must be a positive integer";
        let non_negative = "must be a non-negative integer";

        let dungeon_minutes: u64 = parse_or(&get, "DUNGEON_EXPIRY_MINUTES", 30, positive)?;
        if dungeon_minutes == 0 {
            return Err(ConfigError::Invalid("DUNGEON_EXPIRY_MINUTES", "must be at least 1"));
        }
        let cleanup_seconds: u64 = parse_or(&get, "SESSION_CLEANUP_SECONDS", 60, positive)?;
        if cleanup_seconds == 0 {
            return Err(ConfigError::Invalid("SESSION_CLEANUP_SECONDS", "must be at least 1"));
        }
        let reset_hour: u32 = parse_or(&get, "DAILY_RESET_HOUR_UTC", 6, "must be an hour 0-23")?;
        let daily_reset = DailyReset::new(reset_hour)
            .map_err(|_| ConfigError::Invalid("DAILY_RESET_HOUR_UTC", "must be an hour 0-23"))?;

        let retry = RetryConfig {
            max_retries: parse_or(&get, "GRANT_MAX_RETRIES", 3, non_negative)?,
            base_delay_ms: parse_or(&get, "GRANT_RETRY_BASE_DELAY_MS", 50, non_negative)?,
            ..defaults.retry
        };

        Ok(Self {
            player_db: get("PLAYER_DB").unwrap_or(defaults.player_db),
            master_data_path: get("MASTER_DATA_PATH").map(PathBuf::from),
            dungeon_expiry: Duration::from_secs(dungeon_minutes * 60),
            session_cleanup_interval: Duration::from_secs(cleanup_seconds),
            daily_reset,
            retry,
        })
    }
}

fn parse_or<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
    expectation: &'static str,
) -> Result<T, ConfigError> {
    match get(key) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid(key, expectation)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
