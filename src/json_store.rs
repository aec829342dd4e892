//! JSON document store used when no database is configured.
//!
//! The whole document is kept in memory and rewritten atomically (temp file
//! then rename) after every mutation, except repeat visits which ride along
//! with the next write.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::storage::{Stats, UserSettings};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub visits: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct JsonDocument {
    #[serde(default)]
    users: BTreeMap<i64, UserRecord>,
    #[serde(default)]
    settings: BTreeMap<i64, UserSettings>,
    #[serde(default)]
    forced_channels: Vec<String>,
    #[serde(default)]
    admins: Vec<i64>,
    #[serde(default)]
    stats: Stats,
}

#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    document: Mutex<JsonDocument>,
}

impl JsonStore {
    /// Open the store at `path`, starting empty when the file does not exist
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let document = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("Corrupt store file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Creating new JSON store");
                JsonDocument::default()
            }
            Err(e) => {
                return Err(anyhow::Error::new(e).context(format!("Failed to read {}", path.display())))
            }
        };

        Ok(Self {
            path,
            document: Mutex::new(document),
        })
    }

    async fn persist(&self, document: &JsonDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create store directory")?;
        }
        let bytes = serde_json::to_vec_pretty(document).context("Failed to encode store")?;
        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, bytes)
            .await
            .context("Failed to write store")?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .context("Failed to replace store")?;
        debug!(path = %self.path.display(), "Store persisted");
        Ok(())
    }

    /// Count a visit. Only a first visit is written to disk; repeat visits
    /// are kept in memory and saved with the next write.
    pub async fn track_user(&self, telegram_id: i64) -> Result<UserRecord> {
        let mut document = self.document.lock().await;
        let now = Utc::now();
        let (record, first_visit) = match document.users.entry(telegram_id) {
            Entry::Occupied(mut entry) => {
                let record = entry.get_mut();
                record.last_seen = now;
                record.visits += 1;
                (record.clone(), false)
            }
            Entry::Vacant(entry) => {
                let record = entry.insert(UserRecord {
                    first_seen: now,
                    last_seen: now,
                    visits: 1,
                });
                (record.clone(), true)
            }
        };
        if first_visit {
            self.persist(&document).await?;
        }
        Ok(record)
    }

    pub async fn count_users(&self) -> usize {
        self.document.lock().await.users.len()
    }

    pub async fn all_user_ids(&self) -> Vec<i64> {
        self.document.lock().await.users.keys().copied().collect()
    }

    pub async fn get_settings(&self, telegram_id: i64) -> Option<UserSettings> {
        self.document.lock().await.settings.get(&telegram_id).cloned()
    }

    pub async fn save_settings(&self, settings: &UserSettings) -> Result<()> {
        let mut document = self.document.lock().await;
        document
            .settings
            .insert(settings.telegram_id, settings.clone());
        self.persist(&document).await
    }

    pub async fn forced_channels(&self) -> Vec<String> {
        self.document.lock().await.forced_channels.clone()
    }

    /// Add channels, ignoring ones already present; returns the added names
    pub async fn add_forced_channels(&self, names: &[String]) -> Result<Vec<String>> {
        let mut document = self.document.lock().await;
        let mut added = Vec::new();
        for name in names {
            if !document.forced_channels.contains(name) {
                document.forced_channels.push(name.clone());
                added.push(name.clone());
            }
        }
        self.persist(&document).await?;
        Ok(added)
    }

    /// Remove the given channels, or every channel when `names` is empty
    pub async fn remove_forced_channels(&self, names: &[String]) -> Result<Vec<String>> {
        let mut document = self.document.lock().await;
        let removed = if names.is_empty() {
            std::mem::take(&mut document.forced_channels)
        } else {
            let (removed, kept): (Vec<String>, Vec<String>) = std::mem::take(&mut document.forced_channels)
                .into_iter()
                .partition(|channel| names.contains(channel));
            document.forced_channels = kept;
            removed
        };
        self.persist(&document).await?;
        Ok(removed)
    }

    pub async fn admin_ids(&self) -> Vec<i64> {
        self.document.lock().await.admins.clone()
    }

    pub async fn add_admin(&self, telegram_id: i64) -> Result<bool> {
        let mut document = self.document.lock().await;
        if document.admins.contains(&telegram_id) {
            return Ok(false);
        }
        document.admins.push(telegram_id);
        self.persist(&document).await?;
        Ok(true)
    }

    pub async fn remove_admin(&self, telegram_id: i64) -> Result<bool> {
        let mut document = self.document.lock().await;
        let before = document.admins.len();
        document.admins.retain(|id| *id != telegram_id);
        let removed = document.admins.len() != before;
        if removed {
            self.persist(&document).await?;
        }
        Ok(removed)
    }

    pub async fn record_delivery(&self, bytes: u64) -> Result<()> {
        let mut document = self.document.lock().await;
        document.stats.files += 1;
        document.stats.storage_bytes += bytes;
        self.persist(&document).await
    }

    pub async fn stats(&self) -> Stats {
        self.document.lock().await.stats.clone()
    }
}
