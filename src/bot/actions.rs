//! Terminal file actions: download, run the pipeline, deliver.
//!
//! Each action holds the user's processing guard from the moment it is
//! accepted until its task finishes, and runs as a registered task so
//! `/cancel` can abort it.

use anyhow::{Context, Result};
use chrono::Utc;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{FileId, InputFile, MessageId};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use crate::batch::BatchEntry;
use crate::dialogue::Target;
use crate::errors::{GuardError, PdfError};
use crate::localization::{t_args_lang, t_lang};
use crate::pipeline::{self, Operation, PipelineContext};
use crate::session::FileRef;
use crate::state::AppState;
use crate::storage::UserSettings;

use super::ui_builder::{format_batch_summary, format_pipeline_report};
use super::UserContext;

/// Download a Telegram file into the user's temp directory
pub async fn download_file(bot: &Bot, file_id: &str, temp_dir: &Path) -> Result<NamedTempFile> {
    let file = bot.get_file(FileId(file_id.to_string())).await?;
    let url = format!(
        "https://api.telegram.org/file/bot{}/{}",
        bot.token(),
        file.path
    );

    let response = reqwest::get(&url).await?.error_for_status()?;
    let bytes = response.bytes().await?;

    tokio::fs::create_dir_all(temp_dir)
        .await
        .with_context(|| format!("Failed to create temp dir {}", temp_dir.display()))?;
    let mut temp_file = NamedTempFile::new_in(temp_dir)?;
    temp_file.as_file_mut().write_all(&bytes)?;

    debug!(file_id = %file_id, bytes = bytes.len(), path = %temp_file.path().display(), "File downloaded");
    Ok(temp_file)
}

/// Download a Telegram file and read it back; the temp copy is removed on return
pub async fn download_bytes(bot: &Bot, state: &AppState, user_id: i64, file_id: &str) -> Result<Vec<u8>> {
    let temp_dir = state.config.temp_dir().join(user_id.to_string());
    let temp_file = download_file(bot, file_id, &temp_dir).await?;
    let bytes = tokio::fs::read(temp_file.path()).await?;
    Ok(bytes)
}

/// Delete a message after `delay`
pub fn schedule_delete(bot: Bot, chat_id: ChatId, message_id: MessageId, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Err(e) = bot.delete_message(chat_id, message_id).await {
            debug!(chat_id = %chat_id, error = %e, "Auto-delete failed");
        }
    });
}

/// Send a processed file, count it in the stats and schedule its deletion
pub async fn deliver(
    bot: &Bot,
    state: &AppState,
    chat_id: ChatId,
    bytes: Vec<u8>,
    file_name: String,
    caption: String,
    delete_after_secs: u64,
) -> Result<()> {
    let size = bytes.len() as u64;
    let sent = bot
        .send_document(chat_id, InputFile::memory(bytes).file_name(file_name))
        .caption(caption)
        .await?;

    if let Err(e) = state.storage.record_delivery(size).await {
        warn!(error = %e, "Failed to record delivery stats");
    }
    if delete_after_secs > 0 {
        schedule_delete(
            bot.clone(),
            chat_id,
            sent.id,
            Duration::from_secs(delete_after_secs),
        );
    }
    Ok(())
}

/// Forward a direct link as a document
pub async fn relay_url(bot: &Bot, who: &UserContext, raw: &str) -> Result<()> {
    let url = match reqwest::Url::parse(raw.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => url,
        _ => {
            bot.send_message(who.chat_id, t_lang("error-invalid-url", who.lang()))
                .await?;
            return Ok(());
        }
    };

    info!(user_id = %who.user_id, url = %url, "Relaying direct link");
    if let Err(e) = bot.send_document(who.chat_id, InputFile::url(url)).await {
        warn!(user_id = %who.user_id, error = %e, "Direct link relay failed");
        bot.send_message(who.chat_id, t_lang("error-download-failed", who.lang()))
            .await?;
    }
    Ok(())
}

/// User-facing text for a failed action
pub fn error_text(error: &anyhow::Error, language_code: Option<&str>) -> String {
    match error.downcast_ref::<PdfError>() {
        Some(pdf_error) => t_lang(pdf_error.user_message_key(), language_code),
        None => t_lang("error-processing", language_code),
    }
}

async fn pipeline_context(state: &AppState, settings: &UserSettings) -> PipelineContext {
    let banner = match settings.banner_path.as_deref() {
        Some(path) => match tokio::fs::read(path).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(path = %path, error = %e, "Saved banner is unreadable");
                None
            }
        },
        None => None,
    };
    let timeouts = &state.config.timeouts;

    PipelineContext {
        banner,
        tag: settings.tag.clone(),
        default_lock_password: settings.lock_password.clone(),
        step_timeout: timeouts.processing_timeout(),
        clean_timeout: timeouts.banner_clean_timeout(),
        banner_timeout: timeouts.banner_add_timeout(),
        now: Utc::now(),
    }
}

/// Localization key for a prerequisite `operation` lacks, checked before
/// taking the guard. Lock without a default password is not refused; the
/// file is sent back unlocked with a notice.
pub fn missing_prerequisite(settings: &UserSettings, operation: &Operation) -> Option<&'static str> {
    match operation {
        Operation::AddBanner if settings.banner_path.is_none() => Some("error-no-banner"),
        _ => None,
    }
}

fn guard_source(operation: &Operation, target: Target) -> String {
    match target {
        Target::Single => operation.source_tag().to_string(),
        Target::Batch => format!("batch_{}", operation.source_tag()),
    }
}

/// Take the guard or tell the user they are busy; `None` when busy
async fn try_acquire(bot: &Bot, state: &AppState, who: &UserContext, source: &str) -> Result<Option<u64>> {
    match state.guard.acquire(who.user_id, Some(who.chat_id.0), source) {
        Ok(generation) => Ok(Some(generation)),
        Err(GuardError::Busy { source: running }) => {
            debug!(user_id = %who.user_id, running = %running, requested = %source, "Rejected while busy");
            bot.send_message(who.chat_id, t_lang("error-busy", who.lang()))
                .await?;
            Ok(None)
        }
    }
}

/// Run `operation` on the file attached to the user's session
pub async fn run_single(
    bot: &Bot,
    state: &Arc<AppState>,
    who: &UserContext,
    operation: Operation,
) -> Result<()> {
    let file = {
        let session = state.sessions.get_or_create(who.user_id);
        let file = session.lock().await.file.clone();
        file
    };
    let Some(file) = file else {
        bot.send_message(who.chat_id, t_lang("error-no-file", who.lang()))
            .await?;
        return Ok(());
    };

    let settings = state.settings(who.user_id).await?;
    if let Some(key) = missing_prerequisite(&settings, &operation) {
        bot.send_message(who.chat_id, t_lang(key, who.lang())).await?;
        return Ok(());
    }

    let source = guard_source(&operation, Target::Single);
    let Some(generation) = try_acquire(bot, state, who, &source).await? else {
        return Ok(());
    };

    let (bot, state, who) = (bot.clone(), state.clone(), who.clone());
    let tasks = state.tasks.clone();
    tasks.spawn(who.user_id, async move {
        let result = process_single(&bot, &state, &who, &file, &operation).await;
        if let (Ok(()), Operation::Rename { new_name }) = (&result, &operation) {
            let session = state.sessions.get_or_create(who.user_id);
            session.lock().await.rename_file(&file.file_id, new_name);
        }
        let reason = if result.is_ok() { "completed" } else { "failed" };
        state.guard.release_generation(who.user_id, generation, &source, reason);

        if let Err(e) = result {
            error!(user_id = %who.user_id, operation = %source, error = %e, "Single file action failed");
            if let Err(send_error) = bot.send_message(who.chat_id, error_text(&e, who.lang())).await {
                warn!(user_id = %who.user_id, error = %send_error, "Failed to report action error");
            }
        }
    });
    Ok(())
}

async fn process_single(
    bot: &Bot,
    state: &AppState,
    who: &UserContext,
    file: &FileRef,
    operation: &Operation,
) -> Result<()> {
    let status = bot
        .send_message(who.chat_id, t_lang("processing-started", who.lang()))
        .await?;

    let input = download_bytes(bot, state, who.user_id, &file.file_id).await?;
    let settings = state.settings(who.user_id).await?;
    let ctx = pipeline_context(state, &settings).await;
    let processed = pipeline::execute(operation, input, &ctx).await?;

    let file_name = operation.output_name(&file.file_name, settings.tag.as_deref(), settings.tag_position);
    let caption = format_pipeline_report(&processed.report, who.lang());
    deliver(
        bot,
        state,
        who.chat_id,
        processed.bytes,
        file_name,
        caption,
        settings.delete_delay_secs,
    )
    .await?;

    if let Err(e) = bot.delete_message(who.chat_id, status.id).await {
        debug!(error = %e, "Failed to remove status message");
    }
    Ok(())
}

/// Run `operation` on every queued batch file
pub async fn run_batch(
    bot: &Bot,
    state: &Arc<AppState>,
    who: &UserContext,
    operation: Operation,
) -> Result<()> {
    if state.batches.is_empty(who.user_id) {
        bot.send_message(who.chat_id, t_lang("batch-empty", who.lang()))
            .await?;
        return Ok(());
    }

    let settings = state.settings(who.user_id).await?;
    if let Some(key) = missing_prerequisite(&settings, &operation) {
        bot.send_message(who.chat_id, t_lang(key, who.lang())).await?;
        return Ok(());
    }

    let source = guard_source(&operation, Target::Batch);
    let Some(generation) = try_acquire(bot, state, who, &source).await? else {
        return Ok(());
    };

    let (bot, state, who) = (bot.clone(), state.clone(), who.clone());
    let tasks = state.tasks.clone();
    tasks.spawn(who.user_id, async move {
        let result = process_batch(&bot, &state, &who, &operation).await;
        let reason = if result.is_ok() { "completed" } else { "failed" };
        state.guard.release_generation(who.user_id, generation, &source, reason);

        if let Err(e) = result {
            error!(user_id = %who.user_id, operation = %source, error = %e, "Batch action failed");
            if let Err(send_error) = bot.send_message(who.chat_id, error_text(&e, who.lang())).await {
                warn!(user_id = %who.user_id, error = %send_error, "Failed to report batch error");
            }
        }
    });
    Ok(())
}

async fn process_batch(
    bot: &Bot,
    state: &AppState,
    who: &UserContext,
    operation: &Operation,
) -> Result<()> {
    let count = state.batches.len(who.user_id).to_string();
    bot.send_message(
        who.chat_id,
        t_args_lang("batch-processing", &[("count", &count)], who.lang()),
    )
    .await?;

    let settings = state.settings(who.user_id).await?;
    let ctx = pipeline_context(state, &settings).await;
    let (settings, ctx) = (&settings, &ctx);

    let report = state
        .batches
        .process(who.user_id, move |entry| async move {
            process_entry(bot, state, who, settings, ctx, operation, entry).await
        })
        .await;
    state.batches.stop(who.user_id);

    bot.send_message(who.chat_id, format_batch_summary(&report, who.lang()))
        .await?;
    Ok(())
}

async fn process_entry(
    bot: &Bot,
    state: &AppState,
    who: &UserContext,
    settings: &UserSettings,
    ctx: &PipelineContext,
    operation: &Operation,
    entry: BatchEntry,
) -> Result<()> {
    let input = download_bytes(bot, state, who.user_id, &entry.file_id).await?;
    let processed = pipeline::execute(operation, input, ctx)
        .await
        .map_err(|e| anyhow::anyhow!(t_lang(e.user_message_key(), who.lang())))?;

    let file_name = operation.output_name(&entry.file_name, settings.tag.as_deref(), settings.tag_position);
    let caption = format_pipeline_report(&processed.report, who.lang());
    deliver(
        bot,
        state,
        who.chat_id,
        processed.bytes,
        file_name,
        caption,
        settings.delete_delay_secs,
    )
    .await
}
