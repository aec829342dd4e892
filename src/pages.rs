//! Page selection parsing.
//!
//! Users describe pages as `1,3-5`, as one of the quick picks (`first`,
//! `last`, `middle`) or as a "no pages" word such as `none` or `skip`.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::WizardError;

/// Words meaning "no pages"
pub const NO_PAGES_WORDS: [&str; 5] = ["none", "0", "no", "non", "skip"];

/// Ranges are clamped to this page number
pub const MAX_PAGE_NUMBER: u32 = 10_000;

lazy_static! {
    static ref PAGE_TEXT_RE: Regex =
        Regex::new(r"^[\d,\-\s]+$").expect("Page text pattern should be valid");
}

/// Parse a lenient page list into sorted, unique, 1-based page numbers.
///
/// Malformed parts and reversed ranges are ignored. Empty input or a
/// "no pages" word yields an empty list.
pub fn parse_pages_spec(input: &str) -> Vec<u32> {
    let lowered = input.trim().to_lowercase();
    if lowered.is_empty() || NO_PAGES_WORDS.contains(&lowered.as_str()) {
        return Vec::new();
    }

    let compact: String = lowered.chars().filter(|c| !c.is_whitespace()).collect();
    let mut pages = Vec::new();

    for part in compact.split(',').filter(|p| !p.is_empty()) {
        if let Some((start, end)) = part.split_once('-') {
            let (Ok(start), Ok(end)) = (start.parse::<u32>(), end.parse::<u32>()) else {
                continue;
            };
            if start > end {
                continue;
            }
            let end = end.min(MAX_PAGE_NUMBER);
            pages.extend(start.max(1)..=end);
        } else if let Ok(page) = part.parse::<u32>() {
            if (1..=MAX_PAGE_NUMBER).contains(&page) {
                pages.push(page);
            }
        }
    }

    pages.sort_unstable();
    pages.dedup();
    pages
}

/// Strict variant used for typed input: only digits, commas, dashes and
/// spaces are accepted and the result must name at least one page.
pub fn parse_pages_text(input: &str) -> Result<Vec<u32>, WizardError> {
    let trimmed = input.trim();
    if !PAGE_TEXT_RE.is_match(trimmed) {
        return Err(WizardError::InvalidPageFormat);
    }
    let pages = parse_pages_spec(trimmed);
    if pages.is_empty() {
        return Err(WizardError::NoValidPages);
    }
    Ok(pages)
}

/// Which pages an operation should remove
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    First,
    Last,
    Middle,
    /// Explicit page numbers; empty means "remove nothing"
    List(Vec<u32>),
}

impl PageSelection {
    pub fn none() -> Self {
        PageSelection::List(Vec::new())
    }

    pub fn is_none(&self) -> bool {
        matches!(self, PageSelection::List(pages) if pages.is_empty())
    }

    /// Concrete page numbers for a document of `page_count` pages
    pub fn resolve(&self, page_count: u32) -> Vec<u32> {
        if page_count == 0 {
            return Vec::new();
        }
        match self {
            PageSelection::First => vec![1],
            PageSelection::Last => vec![page_count],
            PageSelection::Middle => vec![(page_count + 1) / 2],
            PageSelection::List(pages) => {
                pages.iter().copied().filter(|p| *p <= page_count).collect()
            }
        }
    }

    /// Parse typed input: quick-pick keywords, "no pages" words or a page list
    pub fn parse(input: &str) -> Result<Self, WizardError> {
        let lowered = input.trim().to_lowercase();
        match lowered.as_str() {
            "first" => Ok(PageSelection::First),
            "last" => Ok(PageSelection::Last),
            "middle" => Ok(PageSelection::Middle),
            word if word.is_empty() || NO_PAGES_WORDS.contains(&word) => Ok(Self::none()),
            _ => parse_pages_text(&lowered).map(PageSelection::List),
        }
    }

    /// Short human label used in confirmations
    pub fn describe(&self) -> String {
        match self {
            PageSelection::First => "first".to_string(),
            PageSelection::Last => "last".to_string(),
            PageSelection::Middle => "middle".to_string(),
            PageSelection::List(pages) if pages.is_empty() => "none".to_string(),
            PageSelection::List(pages) => pages
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}
