//! In-memory per-user sessions.
//!
//! Each user gets one [`Session`] behind its own async mutex. The store hands
//! out the same shared object until the session is cleared or swept.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use crate::dialogue::DialogueState;
use crate::filename::{build_final_filename, TagPosition};
use crate::guard::ProcessingGuard;
use crate::storage::UserSettings;

/// A Telegram file attached to the session, not downloaded yet
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRef {
    pub file_id: String,
    pub file_name: String,
    pub size: u64,
}

#[derive(Debug)]
pub struct Session {
    pub user_id: i64,
    pub state: DialogueState,
    pub file: Option<FileRef>,
    /// Persisted settings cached on first use; `None` until loaded
    pub settings: Option<UserSettings>,
    pub created_at: Instant,
    pub last_activity: Instant,
}

impl Session {
    pub fn new(user_id: i64) -> Self {
        let now = Instant::now();
        Self {
            user_id,
            state: DialogueState::Idle,
            file: None,
            settings: None,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Record a delivered rename on the attached file so later actions
    /// start from the new name. Ignored when another file was attached since.
    pub fn rename_file(&mut self, file_id: &str, new_name: &str) -> bool {
        match self.file.as_mut() {
            Some(file) if file.file_id == file_id => {
                file.file_name = build_final_filename(new_name, None, TagPosition::End);
                true
            }
            _ => false,
        }
    }

    /// Drop the wizard state and attached file, keeping cached settings
    pub fn reset(&mut self) {
        self.state = DialogueState::Idle;
        self.file = None;
        self.touch();
    }
}

pub type SharedSession = Arc<AsyncMutex<Session>>;

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<i64, SharedSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the user's session, creating it on first contact
    pub fn get_or_create(&self, user_id: i64) -> SharedSession {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions
            .entry(user_id)
            .or_insert_with(|| {
                debug!(user_id = %user_id, "Creating session");
                Arc::new(AsyncMutex::new(Session::new(user_id)))
            })
            .clone()
    }

    pub fn get(&self, user_id: i64) -> Option<SharedSession> {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.get(&user_id).cloned()
    }

    /// Destroy the user's session; returns whether one existed
    pub fn clear(&self, user_id: i64) -> bool {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.remove(&user_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove sessions idle longer than `idle_timeout`.
    ///
    /// Sessions that are processing, locked or referenced elsewhere are kept.
    pub fn sweep_idle(&self, idle_timeout: Duration, guard: &ProcessingGuard) -> usize {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();

        sessions.retain(|user_id, session| {
            if guard.is_processing(*user_id) || Arc::strong_count(session) > 1 {
                return true;
            }
            match session.try_lock() {
                Ok(session) => session.idle_for() <= idle_timeout,
                Err(_) => true,
            }
        });

        let removed = before - sessions.len();
        if removed > 0 {
            info!(removed, remaining = sessions.len(), "Swept idle sessions");
        }
        removed
    }
}
