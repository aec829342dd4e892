//! File operations offered by the bot and the Full Process pipeline.
//!
//! Every step parses the bytes it receives and hands back new bytes, so a
//! step that fails or times out can be skipped by keeping its input.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{info, warn};

use crate::errors::PdfError;
use crate::filename::{build_final_filename, TagPosition};
use crate::pages::PageSelection;
use crate::pdf::{self, BannerPlacement};

/// Answer to the lock-password question
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockChoice {
    Skip,
    UseDefault,
    Password(String),
}

impl LockChoice {
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        match trimmed.to_lowercase().as_str() {
            "" | "skip" | "none" | "no" | "0" | "-" => LockChoice::Skip,
            "default" => LockChoice::UseDefault,
            _ => LockChoice::Password(trimmed.to_string()),
        }
    }

    /// Effective password, given the user's saved default
    pub fn resolve(&self, default: Option<&str>) -> Option<String> {
        match self {
            LockChoice::Skip => None,
            LockChoice::UseDefault => default.map(str::to_string),
            LockChoice::Password(password) => Some(password.clone()),
        }
    }
}

/// Answers collected by the Full Process wizard
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FullProcessRequest {
    pub unlock_password: Option<String>,
    pub pages: PageSelection,
    pub lock: LockChoice,
}

impl FullProcessRequest {
    /// No password, no page removal, lock with the saved default
    pub fn with_defaults() -> Self {
        Self {
            unlock_password: None,
            pages: PageSelection::none(),
            lock: LockChoice::UseDefault,
        }
    }
}

/// A terminal action on one file
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Rename { new_name: String },
    Unlock { password: String },
    RemovePages { pages: PageSelection },
    Both { unlock_password: Option<String>, pages: PageSelection },
    AddBanner,
    Lock,
    FullProcess(FullProcessRequest),
}

impl Operation {
    /// Source tag recorded by the processing guard
    pub fn source_tag(&self) -> &'static str {
        match self {
            Operation::Rename { .. } => "rename",
            Operation::Unlock { .. } => "unlock",
            Operation::RemovePages { .. } => "remove_pages",
            Operation::Both { .. } => "unlock_remove_pages",
            Operation::AddBanner => "add_banner",
            Operation::Lock => "lock",
            Operation::FullProcess(_) => "full_pipeline",
        }
    }

    /// Name of the delivered file
    pub fn output_name(&self, original: &str, tag: Option<&str>, position: TagPosition) -> String {
        match self {
            Operation::Rename { new_name } => build_final_filename(new_name, tag, position),
            _ => build_final_filename(original, tag, position),
        }
    }
}

/// Everything the pipeline needs besides the input bytes
#[derive(Clone, Debug)]
pub struct PipelineContext {
    /// The user's banner PDF, if one was uploaded
    pub banner: Option<Vec<u8>>,
    pub tag: Option<String>,
    /// Saved default lock password
    pub default_lock_password: Option<String>,
    pub step_timeout: Duration,
    pub clean_timeout: Duration,
    pub banner_timeout: Duration,
    pub now: DateTime<Utc>,
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self {
            banner: None,
            tag: None,
            default_lock_password: None,
            step_timeout: Duration::from_secs(120),
            clean_timeout: Duration::from_secs(60),
            banner_timeout: Duration::from_secs(60),
            now: Utc::now(),
        }
    }
}

/// What the pipeline did, for the confirmation message
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub unlocked: bool,
    pub banners_removed: usize,
    pub banner_pages_added: usize,
    pub pages_removed: Vec<u32>,
    pub locked: bool,
    /// Lock was requested but no password was available
    pub missing_lock_password: bool,
    /// Steps skipped after failing or timing out
    pub skipped: Vec<&'static str>,
}

#[derive(Clone, Debug)]
pub struct ProcessedFile {
    pub bytes: Vec<u8>,
    pub report: PipelineReport,
}

async fn unlock_step(
    bytes: Vec<u8>,
    password: Option<String>,
    timeout: Duration,
) -> Result<(Vec<u8>, bool), PdfError> {
    pdf::run_blocking(timeout, "unlock", move || {
        let was_encrypted = pdf::is_encrypted(&bytes)?;
        if !was_encrypted {
            return Ok((bytes, false));
        }
        let mut doc = pdf::open(&bytes, password.as_deref())?;
        Ok((pdf::save(&mut doc)?, true))
    })
    .await
}

async fn clean_step(bytes: Vec<u8>, timeout: Duration, report: &mut PipelineReport) -> Vec<u8> {
    let input = bytes.clone();
    let result = pdf::run_blocking(timeout, "clean_banners", move || {
        let mut doc = pdf::open(&input, None)?;
        let removed = pdf::clean_banners(&mut doc);
        if removed == 0 {
            return Ok((input, 0));
        }
        Ok((pdf::save(&mut doc)?, removed))
    })
    .await;

    match result {
        Ok((cleaned, removed)) => {
            report.banners_removed = removed;
            cleaned
        }
        Err(e) => {
            warn!(error = %e, "Banner cleaning skipped");
            report.skipped.push("clean_banners");
            bytes
        }
    }
}

async fn banner_step(
    bytes: Vec<u8>,
    ctx: &PipelineContext,
    report: &mut PipelineReport,
) -> Vec<u8> {
    let input = bytes.clone();
    let banner = ctx.banner.clone();
    let tag = ctx.tag.clone();
    let now = ctx.now;
    let result = pdf::run_blocking(ctx.banner_timeout, "add_banner", move || {
        let banner_doc = match banner {
            Some(banner) => pdf::open(&banner, None)?,
            None => pdf::default_banner(tag.as_deref(), now)?,
        };
        let mut doc = pdf::open(&input, None)?;
        let added = pdf::append_banner(&mut doc, &banner_doc, BannerPlacement::After)?;
        Ok((pdf::save(&mut doc)?, added))
    })
    .await;

    match result {
        Ok((with_banner, added)) => {
            report.banner_pages_added = added;
            with_banner
        }
        Err(e) => {
            warn!(error = %e, "Banner step skipped");
            report.skipped.push("add_banner");
            bytes
        }
    }
}

async fn pages_step(
    bytes: Vec<u8>,
    selection: PageSelection,
    timeout: Duration,
) -> Result<(Vec<u8>, Vec<u32>), PdfError> {
    pdf::run_blocking(timeout, "remove_pages", move || {
        let mut doc = pdf::open(&bytes, None)?;
        let targets = selection.resolve(pdf::page_count(&doc));
        let removed = pdf::remove_pages(&mut doc, &targets)?;
        if removed.is_empty() {
            return Ok((bytes, removed));
        }
        Ok((pdf::save(&mut doc)?, removed))
    })
    .await
}

async fn lock_step(bytes: Vec<u8>, password: String, timeout: Duration) -> Result<Vec<u8>, PdfError> {
    pdf::run_blocking(timeout, "lock", move || {
        let mut doc = pdf::open(&bytes, None)?;
        pdf::encrypt(&mut doc, &password)?;
        pdf::save(&mut doc)
    })
    .await
}

/// Run `operation` on `input`
pub async fn execute(
    operation: &Operation,
    input: Vec<u8>,
    ctx: &PipelineContext,
) -> Result<ProcessedFile, PdfError> {
    let mut report = PipelineReport::default();
    let timeout = ctx.step_timeout;

    let bytes = match operation {
        Operation::Rename { .. } => input,
        Operation::Unlock { password } => {
            let (bytes, unlocked) = unlock_step(input, Some(password.clone()), timeout).await?;
            report.unlocked = unlocked;
            bytes
        }
        Operation::RemovePages { pages } => {
            let (bytes, removed) = pages_step(input, pages.clone(), timeout).await?;
            report.pages_removed = removed;
            bytes
        }
        Operation::Both {
            unlock_password,
            pages,
        } => {
            let (mut bytes, unlocked) = unlock_step(input, unlock_password.clone(), timeout).await?;
            report.unlocked = unlocked;
            if !pages.is_none() {
                let (removed_bytes, removed) = pages_step(bytes, pages.clone(), timeout).await?;
                report.pages_removed = removed;
                bytes = removed_bytes;
            }
            bytes
        }
        Operation::AddBanner => {
            if ctx.banner.is_none() {
                return Err(PdfError::NoBanner);
            }
            let bytes = clean_step(input, ctx.clean_timeout, &mut report).await;
            banner_step(bytes, ctx, &mut report).await
        }
        Operation::Lock => match &ctx.default_lock_password {
            Some(password) => {
                let bytes = lock_step(input, password.clone(), timeout).await?;
                report.locked = true;
                bytes
            }
            None => {
                report.missing_lock_password = true;
                input
            }
        },
        Operation::FullProcess(request) => full_process(request, input, ctx, &mut report).await?,
    };

    info!(
        operation = operation.source_tag(),
        output_bytes = bytes.len(),
        report = ?report,
        "Operation finished"
    );
    Ok(ProcessedFile { bytes, report })
}

/// Unlock, clean banners, add banner, remove pages, lock
async fn full_process(
    request: &FullProcessRequest,
    input: Vec<u8>,
    ctx: &PipelineContext,
    report: &mut PipelineReport,
) -> Result<Vec<u8>, PdfError> {
    let timeout = ctx.step_timeout;

    let (bytes, unlocked) = unlock_step(input, request.unlock_password.clone(), timeout).await?;
    report.unlocked = unlocked;

    let bytes = clean_step(bytes, ctx.clean_timeout, report).await;
    let mut bytes = banner_step(bytes, ctx, report).await;

    if !request.pages.is_none() {
        let (removed_bytes, removed) = pages_step(bytes, request.pages.clone(), timeout).await?;
        report.pages_removed = removed;
        bytes = removed_bytes;
    }

    let lock_password = request
        .lock
        .resolve(ctx.default_lock_password.as_deref());
    match lock_password {
        Some(password) => {
            bytes = lock_step(bytes, password, timeout).await?;
            report.locked = true;
        }
        None if request.lock == LockChoice::UseDefault => report.missing_lock_password = true,
        None => {}
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_choice_parse() {
        assert_eq!(LockChoice::parse("skip"), LockChoice::Skip);
        assert_eq!(LockChoice::parse(" NONE "), LockChoice::Skip);
        assert_eq!(LockChoice::parse("default"), LockChoice::UseDefault);
        assert_eq!(
            LockChoice::parse("p4ss"),
            LockChoice::Password("p4ss".to_string())
        );
    }

    #[test]
    fn test_lock_choice_resolve() {
        assert_eq!(LockChoice::Skip.resolve(Some("x")), None);
        assert_eq!(LockChoice::UseDefault.resolve(Some("x")), Some("x".to_string()));
        assert_eq!(LockChoice::UseDefault.resolve(None), None);
    }

    #[test]
    fn test_output_name_uses_new_name_for_rename() {
        let rename = Operation::Rename {
            new_name: "Thesis".to_string(),
        };
        assert_eq!(
            rename.output_name("old.pdf", Some("@me"), TagPosition::End),
            "Thesis @me.pdf"
        );
        assert_eq!(
            Operation::Lock.output_name("old.pdf", None, TagPosition::End),
            "old.pdf"
        );
    }
}
