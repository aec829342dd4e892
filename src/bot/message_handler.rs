//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{Document, PhotoSize};
use tracing::{debug, error, info, warn};

use crate::batch::BatchEntry;
use crate::dialogue::DialogueState;
use crate::errors::{BatchError, LimitError};
use crate::localization::{t_args_lang, t_lang};
use crate::pdf;
use crate::rate_limit::ActionKind;
use crate::session::FileRef;
use crate::state::AppState;

use super::actions::download_bytes;
use super::admin::ensure_joined;
use super::commands::{handle_command, Command};
use super::dialogue_manager::{handle_text_input, set_state};
use super::ui_builder::{file_actions_keyboard, format_bytes};
use super::UserContext;

/// Entry point for every message update
pub async fn message_handler(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let who = UserContext::new(user, msg.chat.id);

    if let Err(e) = handle_message(&bot, &msg, &state, &who).await {
        error!(user_id = %who.user_id, error = %e, "Failed to handle message");
        bot.send_message(who.chat_id, t_lang("error-generic", who.lang()))
            .await?;
    }
    Ok(())
}

async fn handle_message(bot: &Bot, msg: &Message, state: &Arc<AppState>, who: &UserContext) -> Result<()> {
    if let Err(e) = state.storage.track_user(who.user_id).await {
        warn!(user_id = %who.user_id, error = %e, "Failed to track user");
    }
    {
        let session = state.sessions.get_or_create(who.user_id);
        session.lock().await.touch();
    }

    let command = msg.text().and_then(Command::parse);
    let kind = command
        .as_ref()
        .map(Command::action_kind)
        .unwrap_or(ActionKind::Other);
    let batch_mode = state.batches.is_active(who.user_id);
    match state.limiter.check(who.user_id, Some(msg.id.0), kind, batch_mode) {
        Ok(()) => {}
        Err(LimitError::Duplicate) => {
            debug!(user_id = %who.user_id, message_id = msg.id.0, "Dropped duplicate message");
            return Ok(());
        }
        Err(LimitError::RateLimited) => {
            bot.send_message(who.chat_id, t_lang("error-rate-limited", who.lang()))
                .await?;
            return Ok(());
        }
    }

    if !ensure_joined(bot, state, who).await? {
        return Ok(());
    }

    if let Some(command) = command {
        return handle_command(bot, state, who, command).await;
    }

    if let Some(document) = msg.document() {
        handle_document(bot, state, who, document).await
    } else if let Some(photos) = msg.photo() {
        handle_photo(bot, state, who, photos).await
    } else if let Some(text) = msg.text() {
        handle_text_input(bot, state, who, msg.id, text).await
    } else {
        handle_unsupported_message(bot, who).await
    }
}

fn is_pdf(document: &Document) -> bool {
    let by_mime = document
        .mime_type
        .as_ref()
        .is_some_and(|mime| mime.essence_str() == "application/pdf");
    let by_name = document
        .file_name
        .as_deref()
        .is_some_and(|name| name.to_lowercase().ends_with(".pdf"));
    by_mime || by_name
}

fn is_image(document: &Document) -> bool {
    document
        .mime_type
        .as_ref()
        .is_some_and(|mime| mime.type_() == "image")
}

async fn awaiting_banner(state: &AppState, user_id: i64) -> bool {
    let session = state.sessions.get_or_create(user_id);
    let awaiting = session.lock().await.state == DialogueState::AwaitingBanner;
    awaiting
}

async fn handle_document(
    bot: &Bot,
    state: &Arc<AppState>,
    who: &UserContext,
    document: &Document,
) -> Result<()> {
    let size = u64::from(document.file.size);
    let file_id = document.file.id.0.clone();

    if awaiting_banner(state, who.user_id).await {
        if is_pdf(document) || is_image(document) {
            return save_banner(bot, state, who, &file_id, is_pdf(document)).await;
        }
        bot.send_message(who.chat_id, t_lang("banner-expected", who.lang()))
            .await?;
        return Ok(());
    }

    if !is_pdf(document) {
        bot.send_message(who.chat_id, t_lang("error-not-pdf", who.lang()))
            .await?;
        return Ok(());
    }

    let max = state.config.limits.max_file_size;
    if size > max {
        let limit = format_bytes(max);
        bot.send_message(
            who.chat_id,
            t_args_lang("error-file-too-large", &[("limit", &limit)], who.lang()),
        )
        .await?;
        return Ok(());
    }

    let file_name = document
        .file_name
        .clone()
        .unwrap_or_else(|| "document.pdf".to_string());

    if state.batches.is_active(who.user_id) {
        let entry = BatchEntry {
            file_id,
            file_name,
            size,
        };
        let text = match state.batches.add(who.user_id, entry) {
            Ok(count) => {
                let (count, max) = (count.to_string(), state.batches.max_files().to_string());
                t_args_lang("batch-file-added", &[("count", &count), ("max", &max)], who.lang())
            }
            Err(BatchError::Full { max }) => {
                t_args_lang("batch-full", &[("max", &max.to_string())], who.lang())
            }
            Err(BatchError::NotActive) => t_lang("batch-not-active", who.lang()),
        };
        bot.send_message(who.chat_id, text).await?;
        return Ok(());
    }

    info!(user_id = %who.user_id, file_name = %file_name, size, "PDF received");
    let text = t_args_lang(
        "file-received",
        &[("name", &file_name), ("size", &format_bytes(size))],
        who.lang(),
    );
    {
        let session = state.sessions.get_or_create(who.user_id);
        let mut session = session.lock().await;
        session.file = Some(FileRef {
            file_id,
            file_name,
            size,
        });
        session.state = DialogueState::Idle;
    }
    bot.send_message(who.chat_id, text)
        .reply_markup(file_actions_keyboard(who.user_id, who.lang()))
        .await?;
    Ok(())
}

async fn handle_photo(
    bot: &Bot,
    state: &Arc<AppState>,
    who: &UserContext,
    photos: &[PhotoSize],
) -> Result<()> {
    if !awaiting_banner(state, who.user_id).await {
        bot.send_message(who.chat_id, t_lang("photo-hint", who.lang()))
            .await?;
        return Ok(());
    }
    // Telegram lists sizes smallest first
    let Some(largest) = photos.last() else {
        return Ok(());
    };
    save_banner(bot, state, who, &largest.file.id.0, false).await
}

/// Store an uploaded PDF or image as the user's banner
async fn save_banner(
    bot: &Bot,
    state: &Arc<AppState>,
    who: &UserContext,
    file_id: &str,
    is_pdf_upload: bool,
) -> Result<()> {
    let bytes = download_bytes(bot, state, who.user_id, file_id).await?;
    let timeout = state.config.timeouts.processing_timeout();

    let banner = if is_pdf_upload {
        pdf::run_blocking(timeout, "validate_banner", move || {
            let mut doc = pdf::open(&bytes, None)?;
            pdf::save(&mut doc)
        })
        .await
    } else {
        pdf::run_blocking(timeout, "image_banner", move || pdf::image_to_pdf(&bytes)).await
    };
    let banner = match banner {
        Ok(banner) => banner,
        Err(e) => {
            warn!(user_id = %who.user_id, error = %e, "Banner upload rejected");
            bot.send_message(who.chat_id, t_lang(e.user_message_key(), who.lang()))
                .await?;
            return Ok(());
        }
    };

    let dir = state.config.banners_dir();
    tokio::fs::create_dir_all(&dir).await?;
    let path = dir.join(format!("banner_{}.pdf", who.user_id));
    tokio::fs::write(&path, &banner).await?;

    let path = path.to_string_lossy().to_string();
    state
        .update_settings(who.user_id, |settings| settings.banner_path = Some(path))
        .await?;
    set_state(state, who.user_id, DialogueState::Idle).await;

    info!(user_id = %who.user_id, bytes = banner.len(), "Banner saved");
    bot.send_message(who.chat_id, t_lang("banner-saved", who.lang()))
        .await?;
    Ok(())
}

async fn handle_unsupported_message(bot: &Bot, who: &UserContext) -> Result<()> {
    debug!(user_id = %who.user_id, "Unsupported message type");
    bot.send_message(who.chat_id, t_lang("unsupported-message", who.lang()))
        .await?;
    Ok(())
}
