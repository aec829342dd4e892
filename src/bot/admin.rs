//! Admin commands and the forced-subscription gate.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::Recipient;
use tracing::{info, warn};

use crate::localization::{t_args_lang, t_lang};
use crate::state::AppState;
use crate::storage::{display_channel, normalize_channels};

use super::commands::Command;
use super::ui_builder::join_keyboard;
use super::UserContext;

/// Pause between broadcast messages
const BROADCAST_PAUSE: Duration = Duration::from_millis(50);

/// Channels the user is not a member of, and how many are configured
pub async fn missing_channels(bot: &Bot, state: &AppState, user_id: i64) -> (Vec<String>, usize) {
    let channels = match state.storage.forced_channels().await {
        Ok(channels) => channels,
        Err(e) => {
            warn!(error = %e, "Failed to read forced channels");
            return (Vec::new(), 0);
        }
    };

    let total = channels.len();
    let mut missing = Vec::new();
    for channel in channels {
        let recipient = match channel.parse::<i64>() {
            Ok(id) => Recipient::Id(ChatId(id)),
            Err(_) => Recipient::ChannelUsername(display_channel(&channel)),
        };
        match bot.get_chat_member(recipient, UserId(user_id as u64)).await {
            Ok(member) if member.kind.is_present() => {}
            Ok(_) => missing.push(channel),
            // Unverifiable channels don't block the user
            Err(e) => warn!(channel = %channel, error = %e, "Membership check failed"),
        }
    }
    (missing, total)
}

/// Whether the user may use the bot; sends the join prompt when not
pub async fn ensure_joined(bot: &Bot, state: &AppState, who: &UserContext) -> Result<bool> {
    if state.is_admin(who.user_id).await {
        return Ok(true);
    }

    let (missing, total) = missing_channels(bot, state, who.user_id).await;
    let allowed = if state.config.force_join_require_all {
        missing.is_empty()
    } else {
        total == 0 || missing.len() < total
    };
    if allowed {
        return Ok(true);
    }

    info!(user_id = %who.user_id, missing = ?missing, "User has not joined required channels");
    bot.send_message(who.chat_id, t_lang("join-required", who.lang()))
        .reply_markup(join_keyboard(who.user_id, &missing, who.lang()))
        .await?;
    Ok(false)
}

pub async fn handle_admin_command(
    bot: &Bot,
    state: &Arc<AppState>,
    who: &UserContext,
    command: Command,
) -> Result<()> {
    if !state.is_admin(who.user_id).await {
        warn!(user_id = %who.user_id, command = ?command, "Non-admin tried an admin command");
        bot.send_message(who.chat_id, t_lang("admin-only", who.lang()))
            .await?;
        return Ok(());
    }

    let reply = match command {
        Command::AddFsub(args) => {
            let names = normalize_channels(args.iter().map(String::as_str));
            if names.is_empty() {
                t_lang("fsub-usage", who.lang())
            } else {
                let added = state.storage.add_forced_channels(&names).await?;
                info!(user_id = %who.user_id, added = ?added, "Forced channels added");
                channel_reply("fsub-added", &added, who.lang())
            }
        }
        Command::DelFsub(args) => {
            let names = normalize_channels(args.iter().map(String::as_str));
            let removed = state.storage.remove_forced_channels(&names).await?;
            info!(user_id = %who.user_id, removed = ?removed, "Forced channels removed");
            channel_reply("fsub-removed", &removed, who.lang())
        }
        Command::Channels => {
            let channels = state.storage.forced_channels().await?;
            channel_reply("fsub-list", &channels, who.lang())
        }
        Command::Broadcast(text) => {
            if text.trim().is_empty() {
                t_lang("broadcast-usage", who.lang())
            } else {
                broadcast(bot, state, &text, who).await?
            }
        }
        Command::SetAdmin(raw) => match raw.trim().parse::<i64>() {
            Ok(id) => {
                state.storage.add_admin(id).await?;
                info!(user_id = %who.user_id, new_admin = id, "Admin added");
                t_args_lang("admin-added", &[("id", &id.to_string())], who.lang())
            }
            Err(_) => t_lang("admin-usage", who.lang()),
        },
        Command::DelAdmin(raw) => match raw.trim().parse::<i64>() {
            Ok(id) if state.config.is_owner(id) => t_lang("admin-owner-protected", who.lang()),
            Ok(id) => {
                let key = if state.storage.remove_admin(id).await? {
                    "admin-removed"
                } else {
                    "admin-not-found"
                };
                t_args_lang(key, &[("id", &id.to_string())], who.lang())
            }
            Err(_) => t_lang("admin-usage", who.lang()),
        },
        Command::Admins => {
            let mut ids = state.config.admin_ids.clone();
            for id in state.storage.admin_ids().await? {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            let list = ids
                .iter()
                .map(|id| format!("• {id}"))
                .collect::<Vec<_>>()
                .join("\n");
            t_args_lang("admin-list", &[("list", &list)], who.lang())
        }
        _ => return Ok(()),
    };

    bot.send_message(who.chat_id, reply).await?;
    Ok(())
}

/// Localized channel list for the forced-subscription admin commands
pub fn channel_reply(key: &str, channels: &[String], language_code: Option<&str>) -> String {
    if channels.is_empty() {
        return t_lang("fsub-none", language_code);
    }
    let list = channels
        .iter()
        .map(|channel| format!("• {}", display_channel(channel)))
        .collect::<Vec<_>>()
        .join("\n");
    t_args_lang(key, &[("list", &list)], language_code)
}

async fn broadcast(bot: &Bot, state: &AppState, text: &str, who: &UserContext) -> Result<String> {
    let users = state.storage.all_user_ids().await?;
    let (mut sent, mut failed) = (0usize, 0usize);

    for user_id in &users {
        match bot.send_message(ChatId(*user_id), text).await {
            Ok(_) => sent += 1,
            Err(e) => {
                failed += 1;
                warn!(user_id = %user_id, error = %e, "Broadcast delivery failed");
            }
        }
        tokio::time::sleep(BROADCAST_PAUSE).await;
    }

    info!(admin_id = %who.user_id, sent, failed, "Broadcast finished");
    Ok(t_args_lang(
        "broadcast-done",
        &[("sent", &sent.to_string()), ("failed", &failed.to_string())],
        who.lang(),
    ))
}
