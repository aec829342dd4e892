//! Output file naming.
//!
//! Incoming names often carry channel handles, hashtags and emoji. They are
//! stripped before the user's own tag is applied.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_EXTENSION: &str = ".pdf";
pub const FALLBACK_BASE_NAME: &str = "document";
pub const MAX_FILENAME_LEN: usize = 200;

lazy_static! {
    // Bracketed blocks that contain a handle or hashtag, e.g. "[@channel]" or "(#tag)"
    static ref BRACKET_HANDLE_RE: Regex = Regex::new(r"[\[\(\{<][^\[\]\(\)\{\}<>]*[@#][^\[\]\(\)\{\}<>]*[\]\)\}>]")
        .expect("Bracket handle pattern should be valid");
    static ref USERNAME_RE: Regex =
        Regex::new(r"@[A-Za-z0-9_]+").expect("Username pattern should be valid");
    static ref HASHTAG_RE: Regex = Regex::new(r"#\w+").expect("Hashtag pattern should be valid");
    static ref EMOJI_RE: Regex = Regex::new(
        r"[\x{1F000}-\x{1FAFF}\x{2600}-\x{27BF}\x{2B00}-\x{2BFF}\x{FE0F}\x{200D}]+"
    )
    .expect("Emoji pattern should be valid");
    static ref EMPTY_BRACKETS_RE: Regex = Regex::new(r"[\[\(\{<]\s*[\]\)\}>]")
        .expect("Empty bracket pattern should be valid");
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").expect("Whitespace pattern should be valid");
    static ref UNSAFE_CHARS_RE: Regex =
        Regex::new(r#"[\\/:*?"<>|]"#).expect("Unsafe character pattern should be valid");
}

/// Where the user's tag goes in the output name
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagPosition {
    Start,
    #[default]
    End,
}

impl TagPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagPosition::Start => "start",
            TagPosition::End => "end",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "start" => TagPosition::Start,
            _ => TagPosition::End,
        }
    }
}

/// Strip handles, hashtags, emoji and leftover empty brackets from a name
pub fn clean_filename(name: &str) -> String {
    let cleaned = BRACKET_HANDLE_RE.replace_all(name, " ");
    let cleaned = USERNAME_RE.replace_all(&cleaned, " ");
    let cleaned = HASHTAG_RE.replace_all(&cleaned, " ");
    let cleaned = EMOJI_RE.replace_all(&cleaned, " ");
    let cleaned = EMPTY_BRACKETS_RE.replace_all(&cleaned, " ");
    let cleaned = WHITESPACE_RE.replace_all(&cleaned, " ");
    cleaned
        .trim_matches(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .to_string()
}

/// Drop a trailing `.pdf` in any case; other dots belong to the name
fn strip_pdf_extension(name: &str) -> &str {
    let split = name.len().saturating_sub(DEFAULT_EXTENSION.len());
    match name.get(split..) {
        Some(suffix) if suffix.eq_ignore_ascii_case(DEFAULT_EXTENSION) => &name[..split],
        _ => name,
    }
}

/// Build the delivered file name from the original name and the user's tag
pub fn build_final_filename(original: &str, tag: Option<&str>, position: TagPosition) -> String {
    let base = strip_pdf_extension(original.trim());
    let mut base = clean_filename(base);
    if base.is_empty() {
        base = FALLBACK_BASE_NAME.to_string();
    }

    let tag = tag.map(str::trim).filter(|t| !t.is_empty());
    let combined = match (tag, position) {
        (Some(tag), TagPosition::Start) => format!("{tag} {base}"),
        (Some(tag), TagPosition::End) => format!("{base} {tag}"),
        (None, _) => base,
    };

    let mut safe = UNSAFE_CHARS_RE.replace_all(&combined, "_").to_string();
    if safe.chars().count() > MAX_FILENAME_LEN {
        safe = safe.chars().take(MAX_FILENAME_LEN).collect();
    }
    format!("{}{}", safe.trim(), DEFAULT_EXTENSION)
}

/// Validate a user supplied name for the rename action
pub fn validate_new_filename(name: &str) -> Result<String, &'static str> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err("empty");
    }

    if trimmed.chars().count() > MAX_FILENAME_LEN {
        return Err("too_long");
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_filename_removes_handles_and_tags() {
        assert_eq!(clean_filename("Chapter 5 [@scans_channel] #manga"), "Chapter 5");
        assert_eq!(clean_filename("@uploader Report 2024"), "Report 2024");
        assert_eq!(clean_filename("Notes (#weekly) ()"), "Notes");
    }

    #[test]
    fn test_clean_filename_removes_emoji() {
        assert_eq!(clean_filename("🔥 Hot 📚 Book"), "Hot Book");
    }

    #[test]
    fn test_clean_filename_keeps_plain_text() {
        assert_eq!(clean_filename("Annual Report (Final)"), "Annual Report (Final)");
    }

    #[test]
    fn test_build_final_filename_positions() {
        assert_eq!(
            build_final_filename("Report @chan.pdf", Some("@mytag"), TagPosition::End),
            "Report @mytag.pdf"
        );
        assert_eq!(
            build_final_filename("Report.PDF", Some("[MT]"), TagPosition::Start),
            "[MT] Report.pdf"
        );
    }

    #[test]
    fn test_build_final_filename_defaults() {
        assert_eq!(build_final_filename("scan", None, TagPosition::End), "scan.pdf");
        assert_eq!(build_final_filename("@only.pdf", None, TagPosition::End), "document.pdf");
        assert_eq!(
            build_final_filename("a:b*c?.pdf", None, TagPosition::End),
            "a_b_c_.pdf"
        );
    }

    #[test]
    fn test_build_final_filename_keeps_dots_in_name() {
        assert_eq!(
            build_final_filename("Chapter 1.5 Final", None, TagPosition::End),
            "Chapter 1.5 Final.pdf"
        );
        assert_eq!(build_final_filename("Vol. 3", None, TagPosition::End), "Vol. 3.pdf");
        assert_eq!(
            build_final_filename("notes.txt", Some("@me"), TagPosition::End),
            "notes.txt @me.pdf"
        );
        assert_eq!(build_final_filename("v2.0.Pdf", None, TagPosition::End), "v2.0.pdf");
        assert_eq!(build_final_filename(".pdf", None, TagPosition::End), "document.pdf");
    }

    #[test]
    fn test_validate_new_filename() {
        assert_eq!(validate_new_filename("  Thesis  "), Ok("Thesis".to_string()));
        assert!(validate_new_filename("   ").is_err());
        assert!(validate_new_filename(&"x".repeat(201)).is_err());
    }
}
