//! Storage facade over the Postgres and JSON backends.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, warn};

use crate::config::BotConfig;
use crate::db;
use crate::filename::TagPosition;
use crate::json_store::JsonStore;

/// Per-user preferences that survive restarts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub telegram_id: i64,
    /// Text added to every output file name
    pub tag: Option<String>,
    pub tag_position: TagPosition,
    /// Default password for the lock step
    pub lock_password: Option<String>,
    /// Banner PDF on disk
    pub banner_path: Option<String>,
    /// Seconds before delivered files are deleted; 0 keeps them
    pub delete_delay_secs: u64,
}

impl UserSettings {
    pub fn new(telegram_id: i64, delete_delay_secs: u64) -> Self {
        Self {
            telegram_id,
            tag: None,
            tag_position: TagPosition::default(),
            lock_password: None,
            banner_path: None,
            delete_delay_secs,
        }
    }
}

/// Global delivery counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub files: u64,
    pub storage_bytes: u64,
}

#[derive(Debug)]
pub enum Storage {
    Postgres(PgPool),
    Json(JsonStore),
}

impl Storage {
    /// Connect to Postgres when configured, falling back to the JSON store
    pub async fn connect(config: &BotConfig) -> Result<Self> {
        if let Some(url) = &config.database_url {
            match PgPoolOptions::new().max_connections(5).connect(url).await {
                Ok(pool) => {
                    db::init_database_schema(&pool).await?;
                    info!("Using Postgres storage");
                    return Ok(Storage::Postgres(pool));
                }
                Err(e) => {
                    warn!(error = %e, "Postgres unavailable, falling back to JSON store");
                }
            }
        }

        let path = config.json_store_path();
        info!(path = %path.display(), "Using JSON storage");
        Ok(Storage::Json(JsonStore::open(path).await?))
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Storage::Postgres(_) => "postgres",
            Storage::Json(_) => "json",
        }
    }

    pub async fn track_user(&self, telegram_id: i64) -> Result<()> {
        match self {
            Storage::Postgres(pool) => db::track_user(pool, telegram_id).await.map(|_| ()),
            Storage::Json(store) => store.track_user(telegram_id).await.map(|_| ()),
        }
    }

    pub async fn count_users(&self) -> Result<u64> {
        match self {
            Storage::Postgres(pool) => Ok(db::count_users(pool).await?.max(0) as u64),
            Storage::Json(store) => Ok(store.count_users().await as u64),
        }
    }

    pub async fn all_user_ids(&self) -> Result<Vec<i64>> {
        match self {
            Storage::Postgres(pool) => db::all_user_ids(pool).await,
            Storage::Json(store) => Ok(store.all_user_ids().await),
        }
    }

    /// Settings for `telegram_id`, defaults when none were saved
    pub async fn load_settings(&self, telegram_id: i64, default_delay: u64) -> Result<UserSettings> {
        let stored = match self {
            Storage::Postgres(pool) => db::get_settings(pool, telegram_id).await?,
            Storage::Json(store) => store.get_settings(telegram_id).await,
        };
        Ok(stored.unwrap_or_else(|| UserSettings::new(telegram_id, default_delay)))
    }

    pub async fn save_settings(&self, settings: &UserSettings) -> Result<()> {
        match self {
            Storage::Postgres(pool) => db::save_settings(pool, settings).await,
            Storage::Json(store) => store.save_settings(settings).await,
        }
    }

    pub async fn forced_channels(&self) -> Result<Vec<String>> {
        match self {
            Storage::Postgres(pool) => db::forced_channels(pool).await,
            Storage::Json(store) => Ok(store.forced_channels().await),
        }
    }

    /// Add channels; returns the ones that were not present yet
    pub async fn add_forced_channels(&self, names: &[String]) -> Result<Vec<String>> {
        match self {
            Storage::Postgres(pool) => {
                let existing = db::forced_channels(pool).await?;
                let mut added = Vec::new();
                for name in names.iter().filter(|n| !existing.contains(n)) {
                    db::add_forced_channel(pool, name).await?;
                    added.push(name.clone());
                }
                Ok(added)
            }
            Storage::Json(store) => store.add_forced_channels(names).await,
        }
    }

    /// Remove channels, or all of them when `names` is empty; returns removed names
    pub async fn remove_forced_channels(&self, names: &[String]) -> Result<Vec<String>> {
        match self {
            Storage::Postgres(pool) => {
                if names.is_empty() {
                    let existing = db::forced_channels(pool).await?;
                    db::clear_forced_channels(pool).await?;
                    return Ok(existing);
                }
                let mut removed = Vec::new();
                for name in names {
                    if db::remove_forced_channel(pool, name).await? {
                        removed.push(name.clone());
                    }
                }
                Ok(removed)
            }
            Storage::Json(store) => store.remove_forced_channels(names).await,
        }
    }

    pub async fn admin_ids(&self) -> Result<Vec<i64>> {
        match self {
            Storage::Postgres(pool) => db::admin_ids(pool).await,
            Storage::Json(store) => Ok(store.admin_ids().await),
        }
    }

    pub async fn add_admin(&self, telegram_id: i64) -> Result<bool> {
        match self {
            Storage::Postgres(pool) => db::add_admin(pool, telegram_id).await,
            Storage::Json(store) => store.add_admin(telegram_id).await,
        }
    }

    pub async fn remove_admin(&self, telegram_id: i64) -> Result<bool> {
        match self {
            Storage::Postgres(pool) => db::remove_admin(pool, telegram_id).await,
            Storage::Json(store) => store.remove_admin(telegram_id).await,
        }
    }

    pub async fn record_delivery(&self, bytes: u64) -> Result<()> {
        match self {
            Storage::Postgres(pool) => db::record_delivery(pool, bytes).await,
            Storage::Json(store) => store.record_delivery(bytes).await,
        }
    }

    pub async fn stats(&self) -> Result<Stats> {
        match self {
            Storage::Postgres(pool) => db::get_stats(pool).await,
            Storage::Json(store) => Ok(store.stats().await),
        }
    }
}

/// Normalize channel names given to admin commands.
///
/// Leading `@` or `#` is stripped, empties dropped, order kept, duplicates
/// removed.
pub fn normalize_channels<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut channels: Vec<String> = Vec::new();
    for part in raw {
        for piece in part.split([',', ' ']) {
            let name = piece.trim().trim_start_matches(['@', '#']).trim();
            if !name.is_empty() && !channels.iter().any(|c| c == name) {
                channels.push(name.to_string());
            }
        }
    }
    channels
}

/// Numeric ids (private channels) have no public handle
pub fn is_channel_id(channel: &str) -> bool {
    channel.parse::<i64>().is_ok()
}

/// How a stored channel is shown to people: `@name`, or the bare numeric id
pub fn display_channel(channel: &str) -> String {
    if is_channel_id(channel) {
        channel.to_string()
    } else {
        format!("@{channel}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_channel_prefixes_handles_only() {
        assert_eq!(display_channel("news"), "@news");
        assert_eq!(display_channel("-100123"), "-100123");
        assert_eq!(display_channel("42"), "42");
    }

    #[test]
    fn test_normalize_channels() {
        let channels = normalize_channels(["@news", "#updates,news", " @ ", "-100123"]);
        assert_eq!(channels, vec!["news", "updates", "-100123"]);
    }
}
