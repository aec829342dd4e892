//! # Bot Configuration Module
//!
//! Configuration is read once at startup from the environment (after `.env`
//! has been loaded) and shared read-only afterwards. Every section has a
//! `Default` so tests can build a config without touching the environment.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// Defaults
pub const DEFAULT_MAX_FILE_SIZE: u64 = 20 * 1024 * 1024; // Bot API download ceiling
pub const DEFAULT_MAX_BATCH_FILES: usize = 24;
pub const DEFAULT_AUTO_DELETE_SECS: u64 = 300;
pub const DEFAULT_PROCESSING_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 3600;
pub const DEFAULT_SESSION_SWEEP_SECS: u64 = 600;
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Size and count limits applied to incoming files
#[derive(Debug, Clone)]
pub struct LimitsConfig {
    /// Largest accepted PDF in bytes
    pub max_file_size: u64,
    /// Maximum queued files per batch
    pub max_batch_files: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_batch_files: DEFAULT_MAX_BATCH_FILES,
        }
    }
}

/// Timers for the processing guard, sessions and background maintenance
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Watchdog timeout for a held processing flag
    pub processing_timeout_secs: u64,
    /// Sessions idle longer than this are swept
    pub session_idle_secs: u64,
    /// Interval between session sweeps
    pub session_sweep_interval_secs: u64,
    /// Upper bound for banner detection and removal
    pub banner_clean_timeout_secs: u64,
    /// Upper bound for appending banner pages
    pub banner_add_timeout_secs: u64,
    /// Interval between temp directory sweeps
    pub temp_cleanup_interval_secs: u64,
    /// Temp files older than this are removed
    pub temp_file_max_age_secs: u64,
    /// Default delay before a delivered file is deleted from the chat
    pub auto_delete_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            processing_timeout_secs: DEFAULT_PROCESSING_TIMEOUT_SECS,
            session_idle_secs: DEFAULT_SESSION_IDLE_SECS,
            session_sweep_interval_secs: DEFAULT_SESSION_SWEEP_SECS,
            banner_clean_timeout_secs: 60,
            banner_add_timeout_secs: 60,
            temp_cleanup_interval_secs: 600,
            temp_file_max_age_secs: 7200,
            auto_delete_secs: DEFAULT_AUTO_DELETE_SECS,
        }
    }
}

impl TimeoutConfig {
    pub fn processing_timeout(&self) -> Duration {
        Duration::from_secs(self.processing_timeout_secs)
    }

    pub fn banner_clean_timeout(&self) -> Duration {
        Duration::from_secs(self.banner_clean_timeout_secs)
    }

    pub fn banner_add_timeout(&self) -> Duration {
        Duration::from_secs(self.banner_add_timeout_secs)
    }
}

/// Sliding-window rate limits and duplicate suppression windows
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Actions allowed per window outside batch mode
    pub per_minute: usize,
    /// Actions allowed per window in batch mode
    pub batch_per_minute: usize,
    /// Length of the sliding window in seconds
    pub window_secs: u64,
    /// Same menu command repeated within this window is a duplicate
    pub command_cooldown_ms: u64,
    /// Same message id seen within this window is a duplicate
    pub message_memory_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: 30,
            batch_per_minute: 100,
            window_secs: 60,
            command_cooldown_ms: 2000,
            message_memory_secs: 300,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: String,
    /// Owners configured through the environment; runtime admins live in storage
    pub admin_ids: Vec<i64>,
    /// Postgres URL; `None` selects the JSON file store
    pub database_url: Option<String>,
    /// Root for banners, temp files and the JSON store
    pub data_dir: PathBuf,
    /// Users must join all forced channels (`true`) or at least one
    pub force_join_require_all: bool,
    pub limits: LimitsConfig,
    pub timeouts: TimeoutConfig,
    pub rate_limits: RateLimitConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            admin_ids: Vec::new(),
            database_url: None,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            force_join_require_all: true,
            limits: LimitsConfig::default(),
            timeouts: TimeoutConfig::default(),
            rate_limits: RateLimitConfig::default(),
        }
    }
}

impl BotConfig {
    /// Build the configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let bot_token =
            env::var("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN must be set")?;

        let admin_ids = env::var("ADMIN_IDS")
            .map(|raw| parse_id_list(&raw))
            .unwrap_or_default();

        let database_url = env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let data_dir = env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let limits = LimitsConfig {
            max_file_size: env_or("MAX_FILE_SIZE", defaults.limits.max_file_size)?,
            max_batch_files: env_or("MAX_BATCH_FILES", defaults.limits.max_batch_files)?,
        };

        let t = defaults.timeouts;
        let timeouts = TimeoutConfig {
            processing_timeout_secs: env_or("PROCESSING_TIMEOUT", t.processing_timeout_secs)?,
            session_idle_secs: env_or("SESSION_IDLE_TIMEOUT", t.session_idle_secs)?,
            session_sweep_interval_secs: env_or(
                "SESSION_SWEEP_INTERVAL",
                t.session_sweep_interval_secs,
            )?,
            banner_clean_timeout_secs: env_or("BANNER_CLEAN_TIMEOUT", t.banner_clean_timeout_secs)?,
            banner_add_timeout_secs: env_or("BANNER_ADD_TIMEOUT", t.banner_add_timeout_secs)?,
            temp_cleanup_interval_secs: env_or(
                "TEMP_CLEANUP_INTERVAL",
                t.temp_cleanup_interval_secs,
            )?,
            temp_file_max_age_secs: env_or("TEMP_FILE_MAX_AGE", t.temp_file_max_age_secs)?,
            auto_delete_secs: env_or("AUTO_DELETE_DELAY", t.auto_delete_secs)?,
        };

        let r = defaults.rate_limits;
        let rate_limits = RateLimitConfig {
            per_minute: env_or("RATE_LIMIT_PER_MINUTE", r.per_minute)?,
            batch_per_minute: env_or("BATCH_RATE_LIMIT_PER_MINUTE", r.batch_per_minute)?,
            ..r
        };

        Ok(Self {
            bot_token,
            admin_ids,
            database_url,
            data_dir,
            force_join_require_all: env_or("FORCE_JOIN_REQUIRE_ALL", true)?,
            limits,
            timeouts,
            rate_limits,
        })
    }

    pub fn banners_dir(&self) -> PathBuf {
        self.data_dir.join("banners")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.data_dir.join("tmp")
    }

    pub fn json_store_path(&self) -> PathBuf {
        self.data_dir.join("store.json")
    }

    pub fn is_owner(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

/// Read `key` and parse it, falling back to `default` when unset
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid value for {key}: {e}")),
        _ => Ok(default),
    }
}

/// Parse a comma separated list of numeric ids, skipping junk entries
pub fn parse_id_list(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list("1, 2,abc,,3"), vec![1, 2, 3]);
        assert!(parse_id_list("").is_empty());
    }

    #[test]
    fn test_defaults() {
        let config = BotConfig::default();
        assert_eq!(config.limits.max_batch_files, 24);
        assert_eq!(config.timeouts.processing_timeout(), Duration::from_secs(180));
        assert_eq!(config.rate_limits.per_minute, 30);
        assert_eq!(config.rate_limits.batch_per_minute, 100);
        assert!(config.json_store_path().ends_with("store.json"));
    }
}
