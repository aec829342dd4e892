//! # Processing Guard Module
//!
//! Marks a user as "processing" for the duration of one terminal action
//! (download, transform, send) so a second action cannot start on top of it.
//!
//! # Lifecycle
//!
//! - **acquire**: refused with [`GuardError::Busy`] while a flag is held;
//!   otherwise records the start time and source tag and arms a watchdog
//! - **release**: clears the flag, disarms the watchdog, logs elapsed time
//! - **watchdog**: if the same acquisition is still held when the timeout
//!   fires, the flag is force-cleared and exactly one [`TimeoutNotice`] is
//!   emitted so the user can be told. The running action is left alone.
//!
//! Every acquisition carries a generation number. A watchdog, and a task
//! releasing through [`ProcessingGuard::release_generation`], only ever
//! clear the acquisition they were handed, so a late timer or a slow task
//! cannot clear a newer one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::errors::GuardError;

/// Sent when the watchdog force-clears a stuck flag
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeoutNotice {
    pub user_id: i64,
    pub chat_id: i64,
    pub source: String,
}

#[derive(Debug)]
struct ProcessingFlag {
    started: Instant,
    source: String,
    chat_id: Option<i64>,
    generation: u64,
    watchdog: Option<AbortHandle>,
}

/// Snapshot of a held flag for status output
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessingInfo {
    pub source: String,
    pub elapsed: Duration,
}

#[derive(Clone, Debug)]
pub struct ProcessingGuard {
    flags: Arc<Mutex<HashMap<i64, ProcessingFlag>>>,
    generation: Arc<AtomicU64>,
    timeout: Duration,
    notices: Option<UnboundedSender<TimeoutNotice>>,
}

impl ProcessingGuard {
    /// Create a guard whose watchdog fires after `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self {
            flags: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
            timeout,
            notices: None,
        }
    }

    /// Route watchdog notices to `sender`
    pub fn with_notifier(mut self, sender: UnboundedSender<TimeoutNotice>) -> Self {
        self.notices = Some(sender);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Mark `user_id` as processing and return the acquisition's generation.
    /// Must be called inside a Tokio runtime.
    pub fn acquire(&self, user_id: i64, chat_id: Option<i64>, source: &str) -> Result<u64, GuardError> {
        let mut flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = flags.get(&user_id) {
            warn!(
                user_id = %user_id,
                source = %source,
                held_by = %existing.source,
                elapsed_ms = existing.started.elapsed().as_millis() as u64,
                "[processing] REJECTED, flag already held"
            );
            return Err(GuardError::Busy {
                source: existing.source.clone(),
            });
        }

        let started = Instant::now();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let watchdog = {
            let guard = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(guard.timeout).await;
                guard.expire(user_id, generation);
            })
            .abort_handle()
        };

        flags.insert(
            user_id,
            ProcessingFlag {
                started,
                source: source.to_string(),
                chat_id,
                generation,
                watchdog: Some(watchdog),
            },
        );

        info!(user_id = %user_id, source = %source, generation, "[processing] SET");
        Ok(generation)
    }

    /// Clear the flag; returns how long it was held, `None` if it was not set
    pub fn release(&self, user_id: i64, source: &str, reason: &str) -> Option<Duration> {
        let flag = self.flags.lock().unwrap_or_else(PoisonError::into_inner).remove(&user_id)?;
        Some(Self::log_clear(user_id, flag, source, reason))
    }

    /// Clear the flag only if it is still the acquisition numbered `generation`
    pub fn release_generation(
        &self,
        user_id: i64,
        generation: u64,
        source: &str,
        reason: &str,
    ) -> Option<Duration> {
        let flag = {
            let mut flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
            match flags.get(&user_id) {
                Some(flag) if flag.generation == generation => flags.remove(&user_id),
                _ => None,
            }
        };
        let Some(flag) = flag else {
            debug!(user_id = %user_id, source = %source, generation, "[processing] stale release ignored");
            return None;
        };
        Some(Self::log_clear(user_id, flag, source, reason))
    }

    fn log_clear(user_id: i64, flag: ProcessingFlag, source: &str, reason: &str) -> Duration {
        if let Some(watchdog) = &flag.watchdog {
            watchdog.abort();
        }

        let elapsed = flag.started.elapsed();
        info!(
            user_id = %user_id,
            source = %source,
            acquired_by = %flag.source,
            reason = %reason,
            elapsed_ms = elapsed.as_millis() as u64,
            "[processing] CLEAR"
        );
        elapsed
    }

    pub fn is_processing(&self, user_id: i64) -> bool {
        self.flags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&user_id)
    }

    pub fn info(&self, user_id: i64) -> Option<ProcessingInfo> {
        let flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
        flags.get(&user_id).map(|flag| ProcessingInfo {
            source: flag.source.clone(),
            elapsed: flag.started.elapsed(),
        })
    }

    pub fn active_count(&self) -> usize {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn expire(&self, user_id: i64, generation: u64) {
        let flag = {
            let mut flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
            let current = flags.get(&user_id).map(|flag| flag.generation);
            if current == Some(generation) {
                flags.remove(&user_id)
            } else {
                None
            }
        };

        let Some(flag) = flag else {
            return;
        };

        warn!(
            user_id = %user_id,
            source = %flag.source,
            elapsed_ms = flag.started.elapsed().as_millis() as u64,
            "[processing] WATCHDOG CLEAR"
        );

        if let (Some(chat_id), Some(notices)) = (flag.chat_id, &self.notices) {
            let notice = TimeoutNotice {
                user_id,
                chat_id,
                source: flag.source,
            };
            if notices.send(notice).is_err() {
                warn!(user_id = %user_id, "Timeout notice receiver dropped");
            }
        }
    }
}
