//! Inline button payloads.
//!
//! Every payload has the form `action:user_id` so a press can be checked
//! against the user the keyboard was built for.

use crate::dialogue::Target;
use crate::filename::TagPosition;

/// Delays offered in the auto-delete menu, in seconds (0 = never)
pub const DELETE_DELAY_CHOICES: [u64; 5] = [60, 300, 600, 1800, 0];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileAction {
    Rename,
    Unlock,
    RemovePages,
    Both,
    FullProcess,
    AddBanner,
    Lock,
}

impl FileAction {
    fn name(&self) -> &'static str {
        match self {
            FileAction::Rename => "rename",
            FileAction::Unlock => "unlock",
            FileAction::RemovePages => "pages",
            FileAction::Both => "both",
            FileAction::FullProcess => "fullproc",
            FileAction::AddBanner => "add_banner",
            FileAction::Lock => "lock_now",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        let action = match name {
            "rename" => FileAction::Rename,
            "unlock" => FileAction::Unlock,
            "pages" => FileAction::RemovePages,
            "both" => FileAction::Both,
            "fullproc" => FileAction::FullProcess,
            "add_banner" => FileAction::AddBanner,
            "lock_now" => FileAction::Lock,
            _ => return None,
        };
        Some(action)
    }
}

/// Quick picks on the page-selection keyboard
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PagePick {
    First,
    Last,
    Middle,
    Manual,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    Settings,
    BackToStart,
    BatchMode,
    DownloadLink,
    CheckJoined,
    AddTag,
    DeleteTag,
    SetPosition(TagPosition),
    DeleteDelayMenu,
    SetDeleteDelay(u64),
    File(FileAction, Target),
    Pages(PagePick),
    BatchClear,
    Cancel,
    DeleteBannerConfirm,
    DeleteBannerCancel,
}

impl CallbackAction {
    /// Payload for a button shown to `user_id`
    pub fn data(&self, user_id: i64) -> String {
        let action = match self {
            CallbackAction::Settings => "settings".to_string(),
            CallbackAction::BackToStart => "back_to_start".to_string(),
            CallbackAction::BatchMode => "batch_mode".to_string(),
            CallbackAction::DownloadLink => "download_link".to_string(),
            CallbackAction::CheckJoined => "check_joined".to_string(),
            CallbackAction::AddTag => "add_tag".to_string(),
            CallbackAction::DeleteTag => "delete_tag".to_string(),
            CallbackAction::SetPosition(position) => format!("pos_{}", position.as_str()),
            CallbackAction::DeleteDelayMenu => "delay_menu".to_string(),
            CallbackAction::SetDeleteDelay(secs) => format!("delay_{secs}"),
            CallbackAction::File(action, Target::Single) => action.name().to_string(),
            CallbackAction::File(action, Target::Batch) => format!("batch_{}", action.name()),
            CallbackAction::Pages(PagePick::First) => "pages_first".to_string(),
            CallbackAction::Pages(PagePick::Last) => "pages_last".to_string(),
            CallbackAction::Pages(PagePick::Middle) => "pages_middle".to_string(),
            CallbackAction::Pages(PagePick::Manual) => "pages_manual".to_string(),
            CallbackAction::BatchClear => "batch_clear".to_string(),
            CallbackAction::Cancel => "cancel".to_string(),
            CallbackAction::DeleteBannerConfirm => "delban_confirm".to_string(),
            CallbackAction::DeleteBannerCancel => "delban_cancel".to_string(),
        };
        format!("{action}:{user_id}")
    }

    /// Split a payload into the action and the user it was built for
    pub fn parse(data: &str) -> Option<(Self, i64)> {
        let (action, owner) = data.rsplit_once(':')?;
        let owner: i64 = owner.parse().ok()?;

        let parsed = match action {
            "settings" => CallbackAction::Settings,
            "back_to_start" => CallbackAction::BackToStart,
            "batch_mode" => CallbackAction::BatchMode,
            "download_link" => CallbackAction::DownloadLink,
            "check_joined" => CallbackAction::CheckJoined,
            "add_tag" => CallbackAction::AddTag,
            "delete_tag" => CallbackAction::DeleteTag,
            "pos_start" => CallbackAction::SetPosition(TagPosition::Start),
            "pos_end" => CallbackAction::SetPosition(TagPosition::End),
            "delay_menu" => CallbackAction::DeleteDelayMenu,
            "pages_first" => CallbackAction::Pages(PagePick::First),
            "pages_last" => CallbackAction::Pages(PagePick::Last),
            "pages_middle" => CallbackAction::Pages(PagePick::Middle),
            "pages_manual" => CallbackAction::Pages(PagePick::Manual),
            "batch_clear" => CallbackAction::BatchClear,
            "cancel" => CallbackAction::Cancel,
            "delban_confirm" => CallbackAction::DeleteBannerConfirm,
            "delban_cancel" => CallbackAction::DeleteBannerCancel,
            other => {
                if let Some(secs) = other.strip_prefix("delay_") {
                    let secs: u64 = secs.parse().ok()?;
                    if !DELETE_DELAY_CHOICES.contains(&secs) {
                        return None;
                    }
                    CallbackAction::SetDeleteDelay(secs)
                } else if let Some(name) = other.strip_prefix("batch_") {
                    match FileAction::from_name(name)? {
                        FileAction::Rename => return None,
                        action => CallbackAction::File(action, Target::Batch),
                    }
                } else {
                    CallbackAction::File(FileAction::from_name(other)?, Target::Single)
                }
            }
        };
        Some((parsed, owner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payloads_carry_owner() {
        let data = CallbackAction::File(FileAction::FullProcess, Target::Batch).data(42);
        assert_eq!(data, "batch_fullproc:42");
        assert_eq!(
            CallbackAction::parse(&data),
            Some((CallbackAction::File(FileAction::FullProcess, Target::Batch), 42))
        );
    }

    #[test]
    fn test_rejects_malformed_payloads() {
        assert_eq!(CallbackAction::parse("settings"), None);
        assert_eq!(CallbackAction::parse("settings:abc"), None);
        assert_eq!(CallbackAction::parse("delay_7:1"), None);
        assert_eq!(CallbackAction::parse("batch_rename:1"), None);
        assert_eq!(CallbackAction::parse("explode:1"), None);
    }

    #[test]
    fn test_delay_payloads() {
        assert_eq!(
            CallbackAction::parse("delay_0:5"),
            Some((CallbackAction::SetDeleteDelay(0), 5))
        );
        assert!(CallbackAction::SetDeleteDelay(1800).data(5).len() <= 64);
    }
}
