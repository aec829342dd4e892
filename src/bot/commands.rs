//! Slash command parsing and the user-facing command handlers.

use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use tracing::{debug, info, warn};

use crate::bot::actions::{relay_url, run_single};
use crate::bot::admin::handle_admin_command;
use crate::bot::dialogue_manager::set_state;
use crate::bot::ui_builder::{
    batch_keyboard, delete_banner_keyboard, format_bytes, format_uptime, start_keyboard,
};
use crate::bot::UserContext;
use crate::dialogue::{parse_default_password, DialogueState};
use crate::localization::{t_args_lang, t_lang};
use crate::pipeline::{FullProcessRequest, Operation};
use crate::rate_limit::ActionKind;
use crate::state::AppState;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Batch,
    Process,
    SetBanner,
    ViewBanner,
    DeleteBanner,
    /// `None` asks interactively
    SetPassword(Option<String>),
    DeletePassword,
    Cancel,
    Status,
    Download(Option<String>),
    PdfEdit,
    AddFsub(Vec<String>),
    DelFsub(Vec<String>),
    Channels,
    Broadcast(String),
    SetAdmin(String),
    DelAdmin(String),
    Admins,
    Unknown(String),
}

impl Command {
    /// Parse `/name[@bot] args`; `None` for text that is not a command
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let body = text.strip_prefix('/')?;
        let (head, rest) = match body.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (body, ""),
        };
        let name = head.split('@').next().unwrap_or(head).to_lowercase();
        let arg = (!rest.is_empty()).then(|| rest.to_string());
        let words = || rest.split_whitespace().map(str::to_string).collect::<Vec<_>>();

        let command = match name.as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "batch" => Command::Batch,
            "process" => Command::Process,
            "setbanner" => Command::SetBanner,
            "viewbanner" => Command::ViewBanner,
            "deletebanner" | "delbanner" => Command::DeleteBanner,
            "setpassword" => Command::SetPassword(arg),
            "reset_password" => Command::SetPassword(None),
            "deletepassword" => Command::DeletePassword,
            "cancel" => Command::Cancel,
            "status" => Command::Status,
            "download" => Command::Download(arg),
            "pdf_edit" => Command::PdfEdit,
            "addfsub" => Command::AddFsub(words()),
            "delfsub" => Command::DelFsub(words()),
            "channels" => Command::Channels,
            "broadcast" => Command::Broadcast(rest.to_string()),
            "setadmin" => Command::SetAdmin(rest.to_string()),
            "deladmin" => Command::DelAdmin(rest.to_string()),
            "admins" => Command::Admins,
            other => Command::Unknown(other.to_string()),
        };
        Some(command)
    }

    pub fn is_admin_only(&self) -> bool {
        matches!(
            self,
            Command::AddFsub(_)
                | Command::DelFsub(_)
                | Command::Channels
                | Command::Broadcast(_)
                | Command::SetAdmin(_)
                | Command::DelAdmin(_)
                | Command::Admins
        )
    }

    pub fn action_kind(&self) -> ActionKind {
        match self {
            Command::Start => ActionKind::Start,
            Command::Batch => ActionKind::Batch,
            Command::Process => ActionKind::Process,
            _ => ActionKind::Other,
        }
    }
}

/// Dispatch a parsed command
pub async fn handle_command(
    bot: &Bot,
    state: &Arc<AppState>,
    who: &UserContext,
    command: Command,
) -> Result<()> {
    debug!(user_id = %who.user_id, command = ?command, "Handling command");

    if command.is_admin_only() {
        return handle_admin_command(bot, state, who, command).await;
    }

    match command {
        Command::Start | Command::Help => handle_start(bot, state, who).await,
        Command::Batch => {
            state.batches.start(who.user_id);
            let max = state.batches.max_files().to_string();
            bot.send_message(
                who.chat_id,
                t_args_lang("batch-started", &[("max", &max)], who.lang()),
            )
            .await?;
            Ok(())
        }
        Command::Process => handle_process(bot, state, who).await,
        Command::SetBanner => {
            set_state(state, who.user_id, DialogueState::AwaitingBanner).await;
            bot.send_message(who.chat_id, t_lang("prompt-banner", who.lang()))
                .await?;
            Ok(())
        }
        Command::ViewBanner => handle_view_banner(bot, state, who).await,
        Command::DeleteBanner => {
            let settings = state.settings(who.user_id).await?;
            if settings.banner_path.is_none() {
                bot.send_message(who.chat_id, t_lang("banner-none", who.lang()))
                    .await?;
                return Ok(());
            }
            bot.send_message(who.chat_id, t_lang("banner-delete-confirm", who.lang()))
                .reply_markup(delete_banner_keyboard(who.user_id, who.lang()))
                .await?;
            Ok(())
        }
        Command::SetPassword(Some(raw)) => save_default_password(bot, state, who, &raw).await,
        Command::SetPassword(None) => {
            set_state(state, who.user_id, DialogueState::AwaitingDefaultPassword).await;
            bot.send_message(who.chat_id, t_lang("prompt-default-password", who.lang()))
                .await?;
            Ok(())
        }
        Command::DeletePassword => save_default_password(bot, state, who, "none").await,
        Command::Cancel => handle_cancel(bot, state, who).await,
        Command::Status => handle_status(bot, state, who).await,
        Command::Download(Some(url)) => relay_url(bot, who, &url).await,
        Command::Download(None) => {
            set_state(state, who.user_id, DialogueState::AwaitingDownloadUrl).await;
            bot.send_message(who.chat_id, t_lang("prompt-download-url", who.lang()))
                .await?;
            Ok(())
        }
        Command::PdfEdit => {
            let operation = Operation::FullProcess(FullProcessRequest::with_defaults());
            run_single(bot, state, who, operation).await
        }
        Command::Unknown(name) => {
            debug!(user_id = %who.user_id, command = %name, "Unknown command");
            bot.send_message(who.chat_id, t_lang("unknown-command", who.lang()))
                .await?;
            Ok(())
        }
        // Admin commands were routed above
        _ => Ok(()),
    }
}

async fn handle_start(bot: &Bot, state: &Arc<AppState>, who: &UserContext) -> Result<()> {
    {
        let session = state.sessions.get_or_create(who.user_id);
        session.lock().await.reset();
    }
    state.batches.stop(who.user_id);

    bot.send_message(who.chat_id, t_lang("welcome", who.lang()))
        .reply_markup(start_keyboard(who.user_id, who.lang()))
        .await?;
    Ok(())
}

async fn handle_process(bot: &Bot, state: &Arc<AppState>, who: &UserContext) -> Result<()> {
    let count = state.batches.len(who.user_id);
    if count == 0 {
        let key = if state.batches.is_active(who.user_id) {
            "batch-empty"
        } else {
            "batch-not-active"
        };
        bot.send_message(who.chat_id, t_lang(key, who.lang())).await?;
        return Ok(());
    }

    let count = count.to_string();
    bot.send_message(
        who.chat_id,
        t_args_lang("batch-menu", &[("count", &count)], who.lang()),
    )
    .reply_markup(batch_keyboard(who.user_id, who.lang()))
    .await?;
    Ok(())
}

async fn handle_view_banner(bot: &Bot, state: &Arc<AppState>, who: &UserContext) -> Result<()> {
    let settings = state.settings(who.user_id).await?;
    match settings.banner_path.as_deref() {
        Some(path) if tokio::fs::try_exists(path).await.unwrap_or(false) => {
            bot.send_document(who.chat_id, InputFile::file(path))
                .caption(t_lang("banner-current", who.lang()))
                .await?;
        }
        _ => {
            bot.send_message(who.chat_id, t_lang("banner-none", who.lang()))
                .await?;
        }
    }
    Ok(())
}

/// Store or clear the default lock password
pub async fn save_default_password(
    bot: &Bot,
    state: &Arc<AppState>,
    who: &UserContext,
    raw: &str,
) -> Result<()> {
    let password = parse_default_password(raw);
    let cleared = password.is_none();
    state
        .update_settings(who.user_id, |settings| settings.lock_password = password)
        .await?;
    set_state(state, who.user_id, DialogueState::Idle).await;

    info!(user_id = %who.user_id, cleared, "Default lock password updated");
    let key = if cleared {
        "password-removed"
    } else {
        "password-saved"
    };
    bot.send_message(who.chat_id, t_lang(key, who.lang())).await?;
    Ok(())
}

/// Abort running work, release the guard, leave batch mode and reset the wizard
pub async fn handle_cancel(bot: &Bot, state: &Arc<AppState>, who: &UserContext) -> Result<()> {
    let cancelled = state.tasks.cancel_user(who.user_id);
    let released = state
        .guard
        .release(who.user_id, "cancel", "user_cancelled")
        .is_some();
    let dropped = state.batches.len(who.user_id);
    let was_batch = state.batches.stop(who.user_id);
    {
        let session = state.sessions.get_or_create(who.user_id);
        session.lock().await.reset();
    }

    info!(
        user_id = %who.user_id,
        cancelled,
        released,
        was_batch,
        dropped,
        "Cancel requested"
    );

    let text = if cancelled > 0 || released || was_batch {
        let cancelled = cancelled.to_string();
        let dropped = dropped.to_string();
        t_args_lang(
            "cancel-done",
            &[("tasks", &cancelled), ("files", &dropped)],
            who.lang(),
        )
    } else {
        t_lang("cancel-nothing", who.lang())
    };
    bot.send_message(who.chat_id, text).await?;
    Ok(())
}

async fn handle_status(bot: &Bot, state: &Arc<AppState>, who: &UserContext) -> Result<()> {
    let started = Instant::now();
    let message = bot
        .send_message(who.chat_id, t_lang("status-checking", who.lang()))
        .await?;
    let ping_ms = started.elapsed().as_millis().to_string();

    let users = match state.storage.count_users().await {
        Ok(count) => count.to_string(),
        Err(e) => {
            warn!(error = %e, "Failed to count users");
            "?".to_string()
        }
    };
    let stats = state.storage.stats().await.unwrap_or_default();
    let uptime = format_uptime(state.started_at.elapsed());
    let files = stats.files.to_string();
    let storage = format_bytes(stats.storage_bytes);
    let sessions = state.sessions.len().to_string();
    let processing = state.guard.active_count().to_string();

    let user_state = {
        let session = state.sessions.get_or_create(who.user_id);
        let label = session.lock().await.state.label();
        match state.guard.info(who.user_id) {
            Some(info) => format!("{label}, processing {} ({}s)", info.source, info.elapsed.as_secs()),
            None => label.to_string(),
        }
    };

    let text = t_args_lang(
        "status-report",
        &[
            ("uptime", &uptime),
            ("ping", &ping_ms),
            ("users", &users),
            ("files", &files),
            ("storage", &storage),
            ("sessions", &sessions),
            ("processing", &processing),
            ("backend", state.storage.backend_name()),
            ("state", &user_state),
        ],
        who.lang(),
    );
    bot.edit_message_text(who.chat_id, message.id, text).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_and_addressed_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/Batch@PdfToolsBot"), Some(Command::Batch));
        assert_eq!(Command::parse("hello"), None);
    }

    #[test]
    fn test_parse_arguments() {
        assert_eq!(
            Command::parse("/setpassword  s3cret "),
            Some(Command::SetPassword(Some("s3cret".to_string())))
        );
        assert_eq!(Command::parse("/setpassword"), Some(Command::SetPassword(None)));
        assert_eq!(
            Command::parse("/addfsub @one #two"),
            Some(Command::AddFsub(vec!["@one".to_string(), "#two".to_string()]))
        );
        assert_eq!(Command::parse("/delfsub"), Some(Command::DelFsub(vec![])));
    }

    #[test]
    fn test_admin_only_and_cooldown_kinds() {
        assert!(Command::Broadcast("hi".into()).is_admin_only());
        assert!(!Command::Status.is_admin_only());
        assert_eq!(Command::Process.action_kind(), ActionKind::Process);
        assert_eq!(Command::Status.action_kind(), ActionKind::Other);
    }
}
