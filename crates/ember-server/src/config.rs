//! Typed settings loaded from the process environment and an optional
//! `.env` file. Environment variables always win over `.env` values.
//! Validation runs once, eagerly, before any socket is bound.

use std::path::PathBuf;
use thiserror::Error;

/// Settings construction or validation failure. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must start with 'redis://', got: {value}")]
    InvalidRedisUrl { var: &'static str, value: String },
    #[error("wordlist file not found at: {0}")]
    WordlistMissing(PathBuf),
    #[error("invalid value for {var}: {source}")]
    InvalidNumber { var: &'static str, #[source] source: std::num::ParseIntError },
    #[error("invalid socket address for RAVEN_BIND_ADDR: {0}")]
    InvalidBindAddr(std::net::AddrParseError),
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub redis_url: String,
    pub redis_max_connections: usize,
    pub storage_path: PathBuf,
    pub wordlist_path: PathBuf,
    pub allowed_mime_types: Vec<String>,
    pub max_file_size: u64,
    pub cleanup_interval_minutes: u64,
    pub orphan_age_minutes: u64,
    pub shred_passes: u32,
    pub failure_threshold: i64,
    pub block_window_seconds: i64,
    pub bind_addr: std::net::SocketAddr,
    pub log_level: String,
    pub log_json: bool,
}

const EXPIRY_MINUTES_RANGE: std::ops::RangeInclusive<i64> = 1..=60;
const USES_RANGE: std::ops::RangeInclusive<i64> = 1..=5;

impl Settings {
    /// Load an env file (if present, without overriding already-set
    /// variables), then read and validate every field. Fails fast on the
    /// first problem. `env_path` overrides the default `.env` lookup.
    pub fn load(env_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let loaded = match env_path {
            Some(path) => dotenvy::from_path(path),
            None => dotenvy::dotenv().map(|_| ()),
        };
        if let Err(err) = loaded {
            tracing::debug!(%err, "no .env file loaded");
        }
        Self::from_env()
    }

    fn from_env() -> Result<Self, ConfigError> {
        let redis_url = env_or("RAVEN_REDIS_URL", "redis://localhost:6379/0");
        if !redis_url.starts_with("redis://") {
            return Err(ConfigError::InvalidRedisUrl { var: "RAVEN_REDIS_URL", value: redis_url });
        }

        let wordlist_path = PathBuf::from(env_or("RAVEN_WORDLIST_PATH", "data/diceware_words.txt"));
        if !wordlist_path.exists() {
            return Err(ConfigError::WordlistMissing(wordlist_path));
        }

        let allowed_mime_types = std::env::var("RAVEN_ALLOWED_MIME_TYPES")
            .ok()
            .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect())
            .unwrap_or_default();

        let bind_addr_raw = env_or("RAVEN_BIND_ADDR", "127.0.0.1:8000");
        let bind_addr = bind_addr_raw.parse().map_err(ConfigError::InvalidBindAddr)?;

        Ok(Self {
            redis_url,
            redis_max_connections: parse_env("RAVEN_REDIS_MAX_CONNECTIONS", 10)?,
            storage_path: PathBuf::from(env_or("RAVEN_STORAGE_PATH", "./storage/uploads")),
            wordlist_path,
            allowed_mime_types,
            max_file_size: parse_env("RAVEN_MAX_FILE_SIZE", 1024 * 1024)?,
            cleanup_interval_minutes: parse_env("RAVEN_CLEANUP_INTERVAL_MINUTES", 2)?,
            orphan_age_minutes: parse_env("RAVEN_ORPHAN_AGE_MINUTES", 120)?,
            shred_passes: parse_env("RAVEN_SHRED_PASSES", 1)?,
            failure_threshold: parse_env("RAVEN_FAILURE_THRESHOLD", 5)?,
            block_window_seconds: parse_env("RAVEN_BLOCK_WINDOW_SECONDS", 900)?,
            bind_addr,
            log_level: env_or("RAVEN_LOG_LEVEL", "info"),
            log_json: env_or("RAVEN_LOG_JSON", "false") == "true",
        })
    }

    /// Failure-counter TTL is fixed, not operator-configurable.
    #[must_use]
    pub const fn failure_counter_ttl_seconds(&self) -> i64 {
        600
    }

    #[must_use]
    pub fn expiry_minutes_valid(minutes: i64) -> bool {
        EXPIRY_MINUTES_RANGE.contains(&minutes)
    }

    #[must_use]
    pub fn uses_valid(uses: i64) -> bool {
        USES_RANGE.contains(&uses)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr<Err = std::num::ParseIntError>>(
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw.parse().map_err(|source| ConfigError::InvalidNumber { var, source }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_bounds_match_spec() {
        assert!(Settings::expiry_minutes_valid(1));
        assert!(Settings::expiry_minutes_valid(60));
        assert!(!Settings::expiry_minutes_valid(0));
        assert!(!Settings::expiry_minutes_valid(61));
    }

    #[test]
    fn uses_bounds_match_spec() {
        assert!(Settings::uses_valid(1));
        assert!(Settings::uses_valid(5));
        assert!(!Settings::uses_valid(0));
        assert!(!Settings::uses_valid(6));
    }
}
