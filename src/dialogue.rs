//! Conversation state for each user.
//!
//! A user is in exactly one [`DialogueState`] at a time. Multi-step actions
//! (unlock, remove pages, unlock + remove, full process) run through a
//! [`Wizard`] that collects one answer per stage and finishes with a
//! concrete [`Operation`].

use serde::{Deserialize, Serialize};

use crate::errors::WizardError;
use crate::pages::PageSelection;
use crate::pipeline::{FullProcessRequest, LockChoice, Operation};

/// Words that mean "no password" when answering an optional password prompt
pub const NO_PASSWORD_WORDS: [&str; 5] = ["none", "skip", "no", "0", "-"];

/// What the bot expects from the user's next text message
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum DialogueState {
    #[default]
    Idle,
    AwaitingTag,
    AwaitingDefaultPassword,
    AwaitingBanner,
    AwaitingFilename,
    AwaitingDownloadUrl,
    Wizard(Wizard),
}

impl DialogueState {
    pub fn is_idle(&self) -> bool {
        matches!(self, DialogueState::Idle)
    }

    /// Short name used in logs and status output
    pub fn label(&self) -> &'static str {
        match self {
            DialogueState::Idle => "idle",
            DialogueState::AwaitingTag => "awaiting_tag",
            DialogueState::AwaitingDefaultPassword => "awaiting_default_password",
            DialogueState::AwaitingBanner => "awaiting_banner",
            DialogueState::AwaitingFilename => "awaiting_filename",
            DialogueState::AwaitingDownloadUrl => "awaiting_download_url",
            DialogueState::Wizard(wizard) => wizard.stage.label(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WizardKind {
    Unlock,
    RemovePages,
    /// Unlock then remove pages
    Both,
    /// Unlock, clean banners, add banner, remove pages, lock
    FullProcess,
}

/// Whether the wizard applies to the attached file or to the batch queue
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    Single,
    Batch,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WizardStage {
    UnlockPassword,
    Pages {
        unlock: Option<String>,
    },
    LockPassword {
        unlock: Option<String>,
        pages: PageSelection,
    },
}

impl WizardStage {
    pub fn label(&self) -> &'static str {
        match self {
            WizardStage::UnlockPassword => "awaiting_unlock_password",
            WizardStage::Pages { .. } => "awaiting_pages",
            WizardStage::LockPassword { .. } => "awaiting_lock_password",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Wizard {
    pub kind: WizardKind,
    pub target: Target,
    pub stage: WizardStage,
}

/// Result of feeding one answer into a wizard
#[derive(Clone, Debug, PartialEq)]
pub enum WizardOutcome {
    /// Ask the next question
    Continue(Wizard),
    /// All answers collected
    Finished { target: Target, operation: Operation },
}

impl Wizard {
    pub fn start(kind: WizardKind, target: Target) -> Self {
        let stage = match kind {
            WizardKind::RemovePages => WizardStage::Pages { unlock: None },
            _ => WizardStage::UnlockPassword,
        };
        Self {
            kind,
            target,
            stage,
        }
    }

    /// Feed the user's text answer for the current stage
    pub fn advance(&self, input: &str) -> Result<WizardOutcome, WizardError> {
        match &self.stage {
            WizardStage::UnlockPassword => {
                if self.kind == WizardKind::Unlock {
                    let password = input.trim();
                    if password.is_empty() {
                        return Err(WizardError::EmptyInput);
                    }
                    return Ok(self.finish(Operation::Unlock {
                        password: password.to_string(),
                    }));
                }
                Ok(WizardOutcome::Continue(Wizard {
                    stage: WizardStage::Pages {
                        unlock: normalize_optional_password(input),
                    },
                    ..self.clone()
                }))
            }
            WizardStage::Pages { .. } => self.with_pages(PageSelection::parse(input)?),
            WizardStage::LockPassword { unlock, pages } => {
                Ok(self.finish(Operation::FullProcess(FullProcessRequest {
                    unlock_password: unlock.clone(),
                    pages: pages.clone(),
                    lock: LockChoice::parse(input),
                })))
            }
        }
    }

    /// Apply a quick-pick page button; `None` when not on the pages stage
    pub fn select_pages(&self, selection: PageSelection) -> Option<Result<WizardOutcome, WizardError>> {
        match self.stage {
            WizardStage::Pages { .. } => Some(self.with_pages(selection)),
            _ => None,
        }
    }

    fn with_pages(&self, pages: PageSelection) -> Result<WizardOutcome, WizardError> {
        let WizardStage::Pages { unlock } = &self.stage else {
            return Err(WizardError::EmptyInput);
        };
        match self.kind {
            WizardKind::RemovePages => {
                if pages.is_none() {
                    return Err(WizardError::NoValidPages);
                }
                Ok(self.finish(Operation::RemovePages { pages }))
            }
            WizardKind::Both => Ok(self.finish(Operation::Both {
                unlock_password: unlock.clone(),
                pages,
            })),
            WizardKind::FullProcess => Ok(WizardOutcome::Continue(Wizard {
                stage: WizardStage::LockPassword {
                    unlock: unlock.clone(),
                    pages,
                },
                ..self.clone()
            })),
            WizardKind::Unlock => Err(WizardError::EmptyInput),
        }
    }

    fn finish(&self, operation: Operation) -> WizardOutcome {
        WizardOutcome::Finished {
            target: self.target,
            operation,
        }
    }

    /// Localization key of the question for the current stage
    pub fn prompt_key(&self) -> &'static str {
        match (&self.stage, self.kind) {
            (WizardStage::UnlockPassword, WizardKind::Unlock) => "prompt-unlock-password",
            (WizardStage::UnlockPassword, _) => "prompt-optional-unlock-password",
            (WizardStage::Pages { .. }, WizardKind::RemovePages) => "prompt-pages",
            (WizardStage::Pages { .. }, _) => "prompt-optional-pages",
            (WizardStage::LockPassword { .. }, _) => "prompt-lock-password",
        }
    }

    /// Password answers are deleted from the chat after reading
    pub fn expects_secret(&self) -> bool {
        matches!(
            self.stage,
            WizardStage::UnlockPassword | WizardStage::LockPassword { .. }
        )
    }

    pub fn on_pages_stage(&self) -> bool {
        matches!(self.stage, WizardStage::Pages { .. })
    }
}

/// Map an optional password answer to `None` for the "no password" words
pub fn normalize_optional_password(input: &str) -> Option<String> {
    let trimmed = input.trim();
    let lowered = trimmed.to_lowercase();
    if trimmed.is_empty() || NO_PASSWORD_WORDS.contains(&lowered.as_str()) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse the answer to `/setpassword`; `none`, `off` and `disable` clear it
pub fn parse_default_password(input: &str) -> Option<String> {
    let trimmed = input.trim();
    match trimmed.to_lowercase().as_str() {
        "" | "none" | "off" | "disable" => None,
        _ => Some(trimmed.to_string()),
    }
}

/// Validate a filename tag typed in the settings menu
pub fn validate_tag(input: &str) -> Result<String, &'static str> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err("empty");
    }

    if trimmed.chars().count() > 64 {
        return Err("too_long");
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_optional_password() {
        assert_eq!(normalize_optional_password(" none "), None);
        assert_eq!(normalize_optional_password("SKIP"), None);
        assert_eq!(normalize_optional_password("s3cret"), Some("s3cret".to_string()));
    }

    #[test]
    fn test_parse_default_password() {
        assert_eq!(parse_default_password("off"), None);
        assert_eq!(parse_default_password("Disable"), None);
        assert_eq!(parse_default_password(" hunter2 "), Some("hunter2".to_string()));
    }

    #[test]
    fn test_validate_tag() {
        assert_eq!(validate_tag("  @mychannel "), Ok("@mychannel".to_string()));
        assert!(validate_tag("").is_err());
        assert!(validate_tag(&"t".repeat(65)).is_err());
    }

    #[test]
    fn test_remove_pages_wizard_starts_on_pages() {
        let wizard = Wizard::start(WizardKind::RemovePages, Target::Single);
        assert!(wizard.on_pages_stage());
        assert!(!wizard.expects_secret());
    }

    #[test]
    fn test_select_pages_outside_pages_stage() {
        let wizard = Wizard::start(WizardKind::FullProcess, Target::Single);
        assert!(wizard.select_pages(PageSelection::First).is_none());
    }
}
