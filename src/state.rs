//! Shared application state injected into every handler.

use anyhow::Result;
use std::time::Instant;
use tracing::warn;

use crate::batch::BatchQueue;
use crate::config::BotConfig;
use crate::guard::ProcessingGuard;
use crate::rate_limit::RateLimiter;
use crate::session::SessionStore;
use crate::storage::{Storage, UserSettings};
use crate::tasks::TaskRegistry;

#[derive(Debug)]
pub struct AppState {
    pub config: BotConfig,
    pub sessions: SessionStore,
    pub guard: ProcessingGuard,
    pub batches: BatchQueue,
    pub tasks: TaskRegistry,
    pub limiter: RateLimiter,
    pub storage: Storage,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: BotConfig, storage: Storage, guard: ProcessingGuard) -> Self {
        Self {
            sessions: SessionStore::new(),
            batches: BatchQueue::new(config.limits.max_batch_files),
            tasks: TaskRegistry::new(),
            limiter: RateLimiter::new(config.rate_limits.clone()),
            guard,
            storage,
            config,
            started_at: Instant::now(),
        }
    }

    /// The user's settings, loaded from storage on first use and cached in the session
    pub async fn settings(&self, user_id: i64) -> Result<UserSettings> {
        let session = self.sessions.get_or_create(user_id);
        let mut session = session.lock().await;
        if let Some(settings) = &session.settings {
            return Ok(settings.clone());
        }

        let settings = self
            .storage
            .load_settings(user_id, self.config.timeouts.auto_delete_secs)
            .await?;
        session.settings = Some(settings.clone());
        Ok(settings)
    }

    /// Apply `change` to the user's settings, persist and cache the result
    pub async fn update_settings<F>(&self, user_id: i64, change: F) -> Result<UserSettings>
    where
        F: FnOnce(&mut UserSettings),
    {
        let mut settings = self.settings(user_id).await?;
        change(&mut settings);
        self.storage.save_settings(&settings).await?;

        let session = self.sessions.get_or_create(user_id);
        session.lock().await.settings = Some(settings.clone());
        Ok(settings)
    }

    /// Owners from the environment plus admins added at runtime
    pub async fn is_admin(&self, user_id: i64) -> bool {
        if self.config.is_owner(user_id) {
            return true;
        }
        match self.storage.admin_ids().await {
            Ok(admins) => admins.contains(&user_id),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to read admin list");
                false
            }
        }
    }
}
