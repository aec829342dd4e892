use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

use pdfbot::bot;
use pdfbot::config::BotConfig;
use pdfbot::guard::{ProcessingGuard, TimeoutNotice};
use pdfbot::localization::{init_localization, t_args_lang};
use pdfbot::maintenance::spawn_maintenance;
use pdfbot::state::AppState;
use pdfbot::storage::Storage;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Tell users whose action was force-cleared by the watchdog
async fn forward_timeouts(bot: Bot, state: Arc<AppState>, mut notices: UnboundedReceiver<TimeoutNotice>) {
    while let Some(notice) = notices.recv().await {
        warn!(user_id = %notice.user_id, source = %notice.source, "Processing timed out");

        let minutes = (state.guard.timeout().as_secs() / 60).max(1).to_string();
        let text = t_args_lang("processing-timeout", &[("minutes", &minutes)], None);
        if let Err(e) = bot.send_message(ChatId(notice.chat_id), text).await {
            warn!(user_id = %notice.user_id, error = %e, "Failed to send timeout notice");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_logging();
    info!("Starting PDF Tools Telegram Bot");

    init_localization()?;
    let config = BotConfig::from_env()?;
    tokio::fs::create_dir_all(config.banners_dir()).await?;
    tokio::fs::create_dir_all(config.temp_dir()).await?;

    let storage = Storage::connect(&config).await?;
    info!(backend = storage.backend_name(), "Storage ready");

    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    let guard = ProcessingGuard::new(config.timeouts.processing_timeout()).with_notifier(notice_tx);

    let bot = Bot::new(config.bot_token.clone());
    let state = Arc::new(AppState::new(config, storage, guard));

    tokio::spawn(forward_timeouts(bot.clone(), state.clone(), notice_rx));
    let maintenance = spawn_maintenance(state.clone());

    info!("Bot initialized, starting dispatcher");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(bot::message_handler))
        .branch(Update::filter_callback_query().endpoint(bot::callback_handler));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            debug!(update = ?upd.kind, "Unhandled update");
        })
        .error_handler(LoggingErrorHandler::with_custom_text(
            "An error has occurred in the dispatcher",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    for task in maintenance {
        task.abort();
    }
    info!("Bot stopped");
    Ok(())
}
