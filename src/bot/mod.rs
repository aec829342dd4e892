//! Bot module for handling Telegram interactions
//!
//! - `message_handler`: entry point for messages; documents, photos and text
//! - `callback_handler`: inline keyboard presses
//! - `commands`: slash command parsing and user commands
//! - `admin`: admin commands and the forced-subscription check
//! - `dialogue_manager`: text answers routed by the user's dialogue state
//! - `actions`: terminal file actions, downloads and delivery
//! - `ui_builder`, `callback_data`: keyboards, payloads and message formatting

pub mod actions;
pub mod admin;
pub mod callback_data;
pub mod callback_handler;
pub mod commands;
pub mod dialogue_manager;
pub mod message_handler;
pub mod ui_builder;

use teloxide::types::{ChatId, User};

pub use callback_handler::callback_handler;
pub use message_handler::message_handler;

/// The user an update came from and where to answer
#[derive(Clone, Debug)]
pub struct UserContext {
    pub user_id: i64,
    pub chat_id: ChatId,
    pub language_code: Option<String>,
}

impl UserContext {
    pub fn new(user: &User, chat_id: ChatId) -> Self {
        Self {
            user_id: user.id.0 as i64,
            chat_id,
            language_code: user.language_code.clone(),
        }
    }

    pub fn lang(&self) -> Option<&str> {
        self.language_code.as_deref()
    }
}
