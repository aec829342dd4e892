//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, MessageId};
use tracing::{debug, error, info, warn};

use crate::dialogue::{DialogueState, Target, Wizard, WizardKind};
use crate::localization::{t_args_lang, t_lang};
use crate::pages::PageSelection;
use crate::pipeline::Operation;
use crate::state::AppState;

use super::actions::{run_batch, run_single};
use super::admin::ensure_joined;
use super::callback_data::{CallbackAction, FileAction, PagePick};
use super::dialogue_manager::{apply_wizard_result, set_state, start_wizard};
use super::ui_builder::{delay_keyboard, format_settings, settings_keyboard, start_keyboard};
use super::UserContext;

/// Handle callback queries from inline keyboards
pub async fn callback_handler(bot: Bot, q: CallbackQuery, state: Arc<AppState>) -> Result<()> {
    debug!(user_id = %q.from.id, data = ?q.data, "Received callback query from user");

    let Some(message) = q.message.as_ref() else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };
    let who = UserContext::new(&q.from, message.chat().id);
    let message_id = message.id();

    let Some((action, owner)) = q.data.as_deref().and_then(CallbackAction::parse) else {
        warn!(user_id = %who.user_id, data = ?q.data, "Unknown callback payload");
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    if owner != who.user_id {
        bot.answer_callback_query(q.id.clone())
            .text(t_lang("not-your-button", who.lang()))
            .show_alert(true)
            .await?;
        return Ok(());
    }
    bot.answer_callback_query(q.id.clone()).await?;

    if let Err(e) = handle_action(&bot, &state, &who, message_id, action).await {
        error!(user_id = %who.user_id, action = ?action, error = %e, "Callback action failed");
        bot.send_message(who.chat_id, t_lang("error-generic", who.lang()))
            .await?;
    }
    Ok(())
}

async fn handle_action(
    bot: &Bot,
    state: &Arc<AppState>,
    who: &UserContext,
    message_id: MessageId,
    action: CallbackAction,
) -> Result<()> {
    {
        let session = state.sessions.get_or_create(who.user_id);
        session.lock().await.touch();
    }

    match action {
        CallbackAction::Settings => show_settings(bot, state, who, message_id).await,
        CallbackAction::BackToStart => {
            edit(
                bot,
                who,
                message_id,
                t_lang("welcome", who.lang()),
                start_keyboard(who.user_id, who.lang()),
            )
            .await
        }
        CallbackAction::BatchMode => {
            state.batches.start(who.user_id);
            let max = state.batches.max_files().to_string();
            bot.send_message(
                who.chat_id,
                t_args_lang("batch-started", &[("max", &max)], who.lang()),
            )
            .await?;
            Ok(())
        }
        CallbackAction::DownloadLink => {
            set_state(state, who.user_id, DialogueState::AwaitingDownloadUrl).await;
            bot.send_message(who.chat_id, t_lang("prompt-download-url", who.lang()))
                .await?;
            Ok(())
        }
        CallbackAction::CheckJoined => {
            if ensure_joined(bot, state, who).await? {
                bot.send_message(who.chat_id, t_lang("join-thanks", who.lang()))
                    .await?;
            }
            Ok(())
        }
        CallbackAction::AddTag => {
            set_state(state, who.user_id, DialogueState::AwaitingTag).await;
            bot.send_message(who.chat_id, t_lang("prompt-tag", who.lang()))
                .await?;
            Ok(())
        }
        CallbackAction::DeleteTag => {
            state
                .update_settings(who.user_id, |settings| settings.tag = None)
                .await?;
            show_settings(bot, state, who, message_id).await
        }
        CallbackAction::SetPosition(position) => {
            state
                .update_settings(who.user_id, |settings| settings.tag_position = position)
                .await?;
            show_settings(bot, state, who, message_id).await
        }
        CallbackAction::DeleteDelayMenu => {
            let settings = state.settings(who.user_id).await?;
            edit(
                bot,
                who,
                message_id,
                t_lang("delay-menu", who.lang()),
                delay_keyboard(who.user_id, settings.delete_delay_secs, who.lang()),
            )
            .await
        }
        CallbackAction::SetDeleteDelay(secs) => {
            state
                .update_settings(who.user_id, |settings| settings.delete_delay_secs = secs)
                .await?;
            info!(user_id = %who.user_id, delay_secs = secs, "Auto-delete delay updated");
            show_settings(bot, state, who, message_id).await
        }
        CallbackAction::File(file_action, target) => {
            handle_file_action(bot, state, who, file_action, target).await
        }
        CallbackAction::Pages(pick) => handle_page_pick(bot, state, who, pick).await,
        CallbackAction::BatchClear => {
            let cleared = state.batches.clear(who.user_id).to_string();
            bot.send_message(
                who.chat_id,
                t_args_lang("batch-cleared", &[("count", &cleared)], who.lang()),
            )
            .await?;
            Ok(())
        }
        CallbackAction::Cancel => {
            {
                let session = state.sessions.get_or_create(who.user_id);
                session.lock().await.reset();
            }
            bot.edit_message_text(who.chat_id, message_id, t_lang("operation-cancelled", who.lang()))
                .await?;
            Ok(())
        }
        CallbackAction::DeleteBannerConfirm => {
            let settings = state.settings(who.user_id).await?;
            if let Some(path) = settings.banner_path.as_deref() {
                if let Err(e) = tokio::fs::remove_file(path).await {
                    warn!(user_id = %who.user_id, path = %path, error = %e, "Failed to remove banner file");
                }
            }
            state
                .update_settings(who.user_id, |settings| settings.banner_path = None)
                .await?;
            bot.edit_message_text(who.chat_id, message_id, t_lang("banner-deleted", who.lang()))
                .await?;
            Ok(())
        }
        CallbackAction::DeleteBannerCancel => {
            bot.edit_message_text(who.chat_id, message_id, t_lang("operation-cancelled", who.lang()))
                .await?;
            Ok(())
        }
    }
}

async fn edit(
    bot: &Bot,
    who: &UserContext,
    message_id: MessageId,
    text: String,
    keyboard: InlineKeyboardMarkup,
) -> Result<()> {
    bot.edit_message_text(who.chat_id, message_id, text)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

async fn show_settings(
    bot: &Bot,
    state: &Arc<AppState>,
    who: &UserContext,
    message_id: MessageId,
) -> Result<()> {
    let settings = state.settings(who.user_id).await?;
    edit(
        bot,
        who,
        message_id,
        format_settings(&settings, who.lang()),
        settings_keyboard(who.user_id, &settings, who.lang()),
    )
    .await
}

async fn handle_file_action(
    bot: &Bot,
    state: &Arc<AppState>,
    who: &UserContext,
    action: FileAction,
    target: Target,
) -> Result<()> {
    let ready = match target {
        Target::Single => {
            let session = state.sessions.get_or_create(who.user_id);
            let has_file = session.lock().await.file.is_some();
            has_file
        }
        Target::Batch => !state.batches.is_empty(who.user_id),
    };
    if !ready {
        let key = match target {
            Target::Single => "error-no-file",
            Target::Batch => "batch-empty",
        };
        bot.send_message(who.chat_id, t_lang(key, who.lang())).await?;
        return Ok(());
    }

    let wizard_kind = match action {
        FileAction::Rename => {
            set_state(state, who.user_id, DialogueState::AwaitingFilename).await;
            bot.send_message(who.chat_id, t_lang("prompt-filename", who.lang()))
                .await?;
            return Ok(());
        }
        FileAction::AddBanner | FileAction::Lock => {
            let operation = if action == FileAction::AddBanner {
                Operation::AddBanner
            } else {
                Operation::Lock
            };
            return match target {
                Target::Single => run_single(bot, state, who, operation).await,
                Target::Batch => run_batch(bot, state, who, operation).await,
            };
        }
        FileAction::Unlock => WizardKind::Unlock,
        FileAction::RemovePages => WizardKind::RemovePages,
        FileAction::Both => WizardKind::Both,
        FileAction::FullProcess => WizardKind::FullProcess,
    };

    start_wizard(bot, state, who, Wizard::start(wizard_kind, target)).await
}

async fn handle_page_pick(
    bot: &Bot,
    state: &Arc<AppState>,
    who: &UserContext,
    pick: PagePick,
) -> Result<()> {
    let wizard = {
        let session = state.sessions.get_or_create(who.user_id);
        let current = session.lock().await.state.clone();
        match current {
            DialogueState::Wizard(wizard) if wizard.on_pages_stage() => Some(wizard),
            _ => None,
        }
    };
    let Some(wizard) = wizard else {
        bot.send_message(who.chat_id, t_lang("error-stale-button", who.lang()))
            .await?;
        return Ok(());
    };

    let selection = match pick {
        PagePick::First => PageSelection::First,
        PagePick::Last => PageSelection::Last,
        PagePick::Middle => PageSelection::Middle,
        PagePick::Manual => {
            bot.send_message(who.chat_id, t_lang("prompt-pages-manual", who.lang()))
                .await?;
            return Ok(());
        }
    };

    match wizard.select_pages(selection) {
        Some(result) => apply_wizard_result(bot, state, who, result).await,
        None => Ok(()),
    }
}
