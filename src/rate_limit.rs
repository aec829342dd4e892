//! # Rate Limiter Module
//!
//! Protects the bot from floods and from Telegram re-deliveries.
//!
//! # Rules
//!
//! - **Sliding window**: at most `per_minute` actions per user per window
//!   (`batch_per_minute` while the user is in batch mode)
//! - **Command cooldown**: repeating `/start`, `/batch` or `/process` within
//!   the cooldown is a duplicate
//! - **Message memory**: a message id already seen within the memory window
//!   is a duplicate
//!
//! Duplicates are not counted against the window.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use crate::errors::LimitError;

/// What the user is doing, for cooldown purposes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Start,
    Batch,
    Process,
    Other,
}

impl ActionKind {
    fn has_cooldown(self) -> bool {
        matches!(self, ActionKind::Start | ActionKind::Batch | ActionKind::Process)
    }
}

#[derive(Debug, Default)]
struct LimiterState {
    windows: HashMap<i64, VecDeque<Instant>>,
    last_command: HashMap<(i64, ActionKind), Instant>,
    seen_messages: HashMap<(i64, i32), Instant>,
}

#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    /// Create a limiter with the given configuration
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pdfbot::config::RateLimitConfig;
    /// use pdfbot::rate_limit::{ActionKind, RateLimiter};
    ///
    /// let limiter = RateLimiter::new(RateLimitConfig::default());
    /// assert!(limiter.check(1, Some(10), ActionKind::Other, false).is_ok());
    /// ```
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(LimiterState::default()),
        }
    }

    /// Check and record one action
    pub fn check(
        &self,
        user_id: i64,
        message_id: Option<i32>,
        kind: ActionKind,
        batch_mode: bool,
    ) -> Result<(), LimitError> {
        self.check_at(Instant::now(), user_id, message_id, kind, batch_mode)
    }

    /// [`check`](Self::check) with an explicit clock
    pub fn check_at(
        &self,
        now: Instant,
        user_id: i64,
        message_id: Option<i32>,
        kind: ActionKind,
        batch_mode: bool,
    ) -> Result<(), LimitError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let memory = Duration::from_secs(self.config.message_memory_secs);
        let cooldown = Duration::from_millis(self.config.command_cooldown_ms);
        let window = Duration::from_secs(self.config.window_secs);

        if let Some(message_id) = message_id {
            state
                .seen_messages
                .retain(|_, seen| now.saturating_duration_since(*seen) < memory);
            if state.seen_messages.contains_key(&(user_id, message_id)) {
                return Err(LimitError::Duplicate);
            }
        }

        if kind.has_cooldown() {
            if let Some(last) = state.last_command.get(&(user_id, kind)) {
                if now.saturating_duration_since(*last) < cooldown {
                    return Err(LimitError::Duplicate);
                }
            }
        }

        let limit = if batch_mode {
            self.config.batch_per_minute
        } else {
            self.config.per_minute
        };
        let timestamps = state.windows.entry(user_id).or_default();
        while timestamps
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= window)
        {
            timestamps.pop_front();
        }
        if timestamps.len() >= limit {
            return Err(LimitError::RateLimited);
        }
        timestamps.push_back(now);

        if kind.has_cooldown() {
            state.last_command.insert((user_id, kind), now);
        }
        if let Some(message_id) = message_id {
            state.seen_messages.insert((user_id, message_id), now);
        }
        Ok(())
    }

    /// Drop bookkeeping for users with no recent activity
    pub fn prune(&self) {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let window = Duration::from_secs(self.config.window_secs);
        let memory = Duration::from_secs(self.config.message_memory_secs);

        state.windows.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|t| now.saturating_duration_since(*t) < window)
        });
        state
            .last_command
            .retain(|_, t| now.saturating_duration_since(*t) < window);
        state
            .seen_messages
            .retain(|_, t| now.saturating_duration_since(*t) < memory);
    }
}
