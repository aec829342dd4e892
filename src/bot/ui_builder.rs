//! UI Builder module for creating keyboards and formatting messages

use std::time::Duration;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::batch::BatchReport;
use crate::dialogue::Target;
use crate::filename::TagPosition;
use crate::localization::{t_args_lang, t_lang};
use crate::pipeline::PipelineReport;
use crate::storage::{display_channel, is_channel_id, UserSettings};

use super::callback_data::{CallbackAction, FileAction, PagePick, DELETE_DELAY_CHOICES};

fn button(label: String, action: CallbackAction, user_id: i64) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(label, action.data(user_id))
}

/// Keyboard under the welcome message
pub fn start_keyboard(user_id: i64, language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            button(
                format!("⚙️ {}", t_lang("button-settings", language_code)),
                CallbackAction::Settings,
                user_id,
            ),
            button(
                format!("📚 {}", t_lang("button-batch-mode", language_code)),
                CallbackAction::BatchMode,
                user_id,
            ),
        ],
        vec![button(
            format!("🔗 {}", t_lang("button-download-link", language_code)),
            CallbackAction::DownloadLink,
            user_id,
        )],
    ])
}

/// Actions offered for a single received PDF
pub fn file_actions_keyboard(user_id: i64, language_code: Option<&str>) -> InlineKeyboardMarkup {
    let file = |action: FileAction, emoji: &str, key: &str| {
        button(
            format!("{emoji} {}", t_lang(key, language_code)),
            CallbackAction::File(action, Target::Single),
            user_id,
        )
    };

    InlineKeyboardMarkup::new(vec![
        vec![
            file(FileAction::Rename, "✏️", "button-rename"),
            file(FileAction::Unlock, "🔓", "button-unlock"),
        ],
        vec![
            file(FileAction::RemovePages, "✂️", "button-remove-pages"),
            file(FileAction::Both, "🔓✂️", "button-unlock-remove"),
        ],
        vec![file(FileAction::FullProcess, "🚀", "button-full-process")],
        vec![
            file(FileAction::AddBanner, "🖼️", "button-add-banner"),
            file(FileAction::Lock, "🔒", "button-lock"),
        ],
        vec![button(
            format!("❌ {}", t_lang("button-cancel", language_code)),
            CallbackAction::Cancel,
            user_id,
        )],
    ])
}

/// Actions offered for the whole batch queue
pub fn batch_keyboard(user_id: i64, language_code: Option<&str>) -> InlineKeyboardMarkup {
    let all = |action: FileAction, emoji: &str, key: &str| {
        button(
            format!("{emoji} {}", t_lang(key, language_code)),
            CallbackAction::File(action, Target::Batch),
            user_id,
        )
    };

    InlineKeyboardMarkup::new(vec![
        vec![
            all(FileAction::Unlock, "🔓", "button-unlock-all"),
            all(FileAction::RemovePages, "✂️", "button-remove-pages-all"),
        ],
        vec![
            all(FileAction::Both, "🔓✂️", "button-unlock-remove-all"),
            all(FileAction::FullProcess, "🚀", "button-full-process-all"),
        ],
        vec![
            all(FileAction::AddBanner, "🖼️", "button-add-banner-all"),
            all(FileAction::Lock, "🔒", "button-lock-all"),
        ],
        vec![button(
            format!("🗑️ {}", t_lang("button-clear-batch", language_code)),
            CallbackAction::BatchClear,
            user_id,
        )],
    ])
}

/// Quick picks for the pages question
pub fn pages_keyboard(user_id: i64, language_code: Option<&str>) -> InlineKeyboardMarkup {
    let pick = |pick: PagePick, key: &str| {
        button(t_lang(key, language_code), CallbackAction::Pages(pick), user_id)
    };

    InlineKeyboardMarkup::new(vec![
        vec![
            pick(PagePick::First, "button-page-first"),
            pick(PagePick::Middle, "button-page-middle"),
            pick(PagePick::Last, "button-page-last"),
        ],
        vec![pick(PagePick::Manual, "button-page-manual")],
        vec![button(
            format!("❌ {}", t_lang("button-cancel", language_code)),
            CallbackAction::Cancel,
            user_id,
        )],
    ])
}

/// Settings text shown above [`settings_keyboard`]
pub fn format_settings(settings: &UserSettings, language_code: Option<&str>) -> String {
    let none = t_lang("settings-none", language_code);
    let tag = settings.tag.clone().unwrap_or_else(|| none.clone());
    let password = if settings.lock_password.is_some() {
        t_lang("settings-set", language_code)
    } else {
        none.clone()
    };
    let banner = if settings.banner_path.is_some() {
        t_lang("settings-set", language_code)
    } else {
        none
    };
    let position = position_label(settings.tag_position, language_code);
    let delay = format_delay(settings.delete_delay_secs, language_code);

    t_args_lang(
        "settings-summary",
        &[
            ("tag", &tag),
            ("position", &position),
            ("password", &password),
            ("banner", &banner),
            ("delay", &delay),
        ],
        language_code,
    )
}

fn position_label(position: TagPosition, language_code: Option<&str>) -> String {
    match position {
        TagPosition::Start => t_lang("position-start", language_code),
        TagPosition::End => t_lang("position-end", language_code),
    }
}

pub fn settings_keyboard(
    user_id: i64,
    settings: &UserSettings,
    language_code: Option<&str>,
) -> InlineKeyboardMarkup {
    let mark = |position: TagPosition| {
        let label = position_label(position, language_code);
        if settings.tag_position == position {
            format!("✅ {label}")
        } else {
            label
        }
    };

    InlineKeyboardMarkup::new(vec![
        vec![
            button(
                format!("🏷️ {}", t_lang("button-set-tag", language_code)),
                CallbackAction::AddTag,
                user_id,
            ),
            button(
                format!("🗑️ {}", t_lang("button-delete-tag", language_code)),
                CallbackAction::DeleteTag,
                user_id,
            ),
        ],
        vec![
            button(
                mark(TagPosition::Start),
                CallbackAction::SetPosition(TagPosition::Start),
                user_id,
            ),
            button(
                mark(TagPosition::End),
                CallbackAction::SetPosition(TagPosition::End),
                user_id,
            ),
        ],
        vec![button(
            format!(
                "⏱️ {}: {}",
                t_lang("button-auto-delete", language_code),
                format_delay(settings.delete_delay_secs, language_code)
            ),
            CallbackAction::DeleteDelayMenu,
            user_id,
        )],
        vec![button(
            format!("⬅️ {}", t_lang("button-back", language_code)),
            CallbackAction::BackToStart,
            user_id,
        )],
    ])
}

pub fn delay_keyboard(user_id: i64, current: u64, language_code: Option<&str>) -> InlineKeyboardMarkup {
    let choices = DELETE_DELAY_CHOICES
        .iter()
        .map(|&secs| {
            let label = format_delay(secs, language_code);
            let label = if secs == current {
                format!("✅ {label}")
            } else {
                label
            };
            vec![button(label, CallbackAction::SetDeleteDelay(secs), user_id)]
        })
        .chain(std::iter::once(vec![button(
            format!("⬅️ {}", t_lang("button-back", language_code)),
            CallbackAction::Settings,
            user_id,
        )]))
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(choices)
}

/// Links to the required channels plus a re-check button
pub fn join_keyboard(
    user_id: i64,
    channels: &[String],
    language_code: Option<&str>,
) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = channels
        .iter()
        .filter(|channel| !is_channel_id(channel))
        .filter_map(|channel| {
            let url = reqwest::Url::parse(&format!("https://t.me/{channel}")).ok()?;
            Some(vec![InlineKeyboardButton::url(format!("📢 {}", display_channel(channel)), url)])
        })
        .collect();
    rows.push(vec![button(
        format!("✅ {}", t_lang("button-check-joined", language_code)),
        CallbackAction::CheckJoined,
        user_id,
    )]);
    InlineKeyboardMarkup::new(rows)
}

pub fn delete_banner_keyboard(user_id: i64, language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        button(
            format!("✅ {}", t_lang("button-confirm", language_code)),
            CallbackAction::DeleteBannerConfirm,
            user_id,
        ),
        button(
            format!("❌ {}", t_lang("button-cancel", language_code)),
            CallbackAction::DeleteBannerCancel,
            user_id,
        ),
    ]])
}

/// Human readable size, e.g. `1.5 MB`
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Uptime as `HHhMMmSSs`
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!("{:02}h{:02}m{:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}

pub fn format_delay(secs: u64, language_code: Option<&str>) -> String {
    if secs == 0 {
        return t_lang("delay-never", language_code);
    }
    let minutes = (secs / 60).max(1).to_string();
    t_args_lang("delay-minutes", &[("minutes", &minutes)], language_code)
}

/// Caption describing what happened to a delivered file
pub fn format_pipeline_report(report: &PipelineReport, language_code: Option<&str>) -> String {
    let mut lines = vec![format!("✅ {}", t_lang("result-done", language_code))];

    if report.unlocked {
        lines.push(format!("🔓 {}", t_lang("result-unlocked", language_code)));
    }
    if report.banners_removed > 0 {
        let count = report.banners_removed.to_string();
        lines.push(format!(
            "🧹 {}",
            t_args_lang("result-banners-removed", &[("count", &count)], language_code)
        ));
    }
    if report.banner_pages_added > 0 {
        lines.push(format!("🖼️ {}", t_lang("result-banner-added", language_code)));
    }
    if !report.pages_removed.is_empty() {
        let pages = report
            .pages_removed
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!(
            "✂️ {}",
            t_args_lang("result-pages-removed", &[("pages", &pages)], language_code)
        ));
    }
    if report.locked {
        lines.push(format!("🔒 {}", t_lang("result-locked", language_code)));
    }
    if report.missing_lock_password {
        lines.push(format!("⚠️ {}", t_lang("result-no-lock-password", language_code)));
    }
    if !report.skipped.is_empty() {
        let steps = report.skipped.join(", ");
        lines.push(format!(
            "⚠️ {}",
            t_args_lang("result-steps-skipped", &[("steps", &steps)], language_code)
        ));
    }

    lines.join("\n")
}

/// Summary sent after a batch finishes
pub fn format_batch_summary(report: &BatchReport, language_code: Option<&str>) -> String {
    let succeeded = report.succeeded.to_string();
    let failed = report.failed_count().to_string();
    let total = report.total().to_string();
    let mut text = t_args_lang(
        "batch-summary",
        &[("succeeded", &succeeded), ("failed", &failed), ("total", &total)],
        language_code,
    );
    for failure in &report.failed {
        text.push_str(&format!("\n• {}: {}", failure.file_name, failure.error));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(20 * 1024 * 1024), "20.0 MB");
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "00h00m00s");
        assert_eq!(format_uptime(Duration::from_secs(3725)), "01h02m05s");
        assert_eq!(format_uptime(Duration::from_secs(100 * 3600)), "100h00m00s");
    }
}
