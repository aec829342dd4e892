//! Dialogue Manager module: routes text answers by the user's dialogue state
//! and drives the multi-step wizards.

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::MessageId;
use tracing::{debug, info};

use crate::dialogue::{validate_tag, DialogueState, Target, Wizard, WizardOutcome};
use crate::errors::WizardError;
use crate::filename::validate_new_filename;
use crate::localization::t_lang;
use crate::pipeline::Operation;
use crate::state::AppState;

use super::actions::{relay_url, run_batch, run_single};
use super::commands::save_default_password;
use super::ui_builder::{format_settings, pages_keyboard, settings_keyboard};
use super::UserContext;

/// Handle a plain text message according to the current dialogue state
pub async fn handle_text_input(
    bot: &Bot,
    state: &Arc<AppState>,
    who: &UserContext,
    message_id: MessageId,
    text: &str,
) -> Result<()> {
    let current = {
        let session = state.sessions.get_or_create(who.user_id);
        let current = session.lock().await.state.clone();
        current
    };
    debug!(user_id = %who.user_id, state = current.label(), "Routing text input");

    match current {
        DialogueState::Idle => {
            if is_direct_pdf_link(text) {
                return relay_url(bot, who, text).await;
            }
            bot.send_message(who.chat_id, t_lang("idle-hint", who.lang()))
                .await?;
        }
        DialogueState::AwaitingTag => match validate_tag(text) {
            Ok(tag) => {
                let settings = state
                    .update_settings(who.user_id, |settings| settings.tag = Some(tag))
                    .await?;
                set_state(state, who.user_id, DialogueState::Idle).await;
                bot.send_message(who.chat_id, format_settings(&settings, who.lang()))
                    .reply_markup(settings_keyboard(who.user_id, &settings, who.lang()))
                    .await?;
            }
            Err(reason) => {
                let text = validation_message(reason, "error-tag-too-long", who.lang());
                bot.send_message(who.chat_id, text).await?;
            }
        },
        DialogueState::AwaitingDefaultPassword => {
            delete_secret(bot, who, message_id).await;
            save_default_password(bot, state, who, text).await?;
        }
        DialogueState::AwaitingBanner => {
            bot.send_message(who.chat_id, t_lang("banner-expected", who.lang()))
                .await?;
        }
        DialogueState::AwaitingFilename => match validate_new_filename(text) {
            Ok(new_name) => {
                set_state(state, who.user_id, DialogueState::Idle).await;
                run_single(bot, state, who, Operation::Rename { new_name }).await?;
            }
            Err(reason) => {
                let text = validation_message(reason, "error-name-too-long", who.lang());
                bot.send_message(who.chat_id, text).await?;
            }
        },
        DialogueState::AwaitingDownloadUrl => {
            set_state(state, who.user_id, DialogueState::Idle).await;
            relay_url(bot, who, text).await?;
        }
        DialogueState::Wizard(wizard) => {
            if wizard.expects_secret() {
                delete_secret(bot, who, message_id).await;
            }
            apply_wizard_result(bot, state, who, wizard.advance(text)).await?;
        }
    }
    Ok(())
}

/// A pasted `http(s)` link pointing at a PDF file
fn is_direct_pdf_link(text: &str) -> bool {
    reqwest::Url::parse(text.trim()).is_ok_and(|url| {
        matches!(url.scheme(), "http" | "https") && url.path().to_lowercase().ends_with(".pdf")
    })
}

fn validation_message(reason: &str, too_long_key: &str, language_code: Option<&str>) -> String {
    match reason {
        "too_long" => t_lang(too_long_key, language_code),
        _ => t_lang("error-empty-input", language_code),
    }
}

/// Remove a message carrying a password
async fn delete_secret(bot: &Bot, who: &UserContext, message_id: MessageId) {
    if let Err(e) = bot.delete_message(who.chat_id, message_id).await {
        debug!(user_id = %who.user_id, error = %e, "Could not delete password message");
    }
}

/// Replace the user's dialogue state
pub async fn set_state(state: &AppState, user_id: i64, next: DialogueState) {
    let session = state.sessions.get_or_create(user_id);
    let mut session = session.lock().await;
    session.state = next;
    session.touch();
}

/// Enter `wizard` and ask its first question
pub async fn start_wizard(
    bot: &Bot,
    state: &Arc<AppState>,
    who: &UserContext,
    wizard: Wizard,
) -> Result<()> {
    info!(user_id = %who.user_id, kind = ?wizard.kind, target = ?wizard.target, "Wizard started");
    ask(bot, who, &wizard).await?;
    set_state(state, who.user_id, DialogueState::Wizard(wizard)).await;
    Ok(())
}

async fn ask(bot: &Bot, who: &UserContext, wizard: &Wizard) -> Result<()> {
    let prompt = t_lang(wizard.prompt_key(), who.lang());
    if wizard.on_pages_stage() {
        bot.send_message(who.chat_id, prompt)
            .reply_markup(pages_keyboard(who.user_id, who.lang()))
            .await?;
    } else {
        bot.send_message(who.chat_id, prompt).await?;
    }
    Ok(())
}

/// Move the wizard forward, or start the terminal action when it is done
pub async fn apply_wizard_result(
    bot: &Bot,
    state: &Arc<AppState>,
    who: &UserContext,
    result: Result<WizardOutcome, WizardError>,
) -> Result<()> {
    match result {
        Ok(WizardOutcome::Continue(next)) => {
            ask(bot, who, &next).await?;
            set_state(state, who.user_id, DialogueState::Wizard(next)).await;
        }
        Ok(WizardOutcome::Finished { target, operation }) => {
            set_state(state, who.user_id, DialogueState::Idle).await;
            info!(user_id = %who.user_id, operation = operation.source_tag(), target = ?target, "Wizard finished");
            match target {
                Target::Single => run_single(bot, state, who, operation).await?,
                Target::Batch => run_batch(bot, state, who, operation).await?,
            }
        }
        Err(e) => {
            debug!(user_id = %who.user_id, error = %e, "Wizard answer rejected");
            bot.send_message(who.chat_id, t_lang(e.user_message_key(), who.lang()))
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_direct_pdf_link() {
        assert!(is_direct_pdf_link("https://example.com/files/Report.PDF"));
        assert!(is_direct_pdf_link(" http://example.com/a.pdf?dl=1 "));
        assert!(!is_direct_pdf_link("https://example.com/page.html"));
        assert!(!is_direct_pdf_link("ftp://example.com/a.pdf"));
        assert!(!is_direct_pdf_link("just some text.pdf"));
    }
}
