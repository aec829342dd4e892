//! # PDF Operations Module
//!
//! Page surgery, banner handling and encryption on top of `lopdf`.
//!
//! All functions here are synchronous and CPU bound. Async callers go through
//! [`run_blocking`] so the work lands on the blocking pool with a time limit.

use chrono::{DateTime, Utc};
use lopdf::content::{Content, Operation};
use lopdf::encryption::{EncryptionState, EncryptionVersion, Permissions};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::errors::PdfError;

/// Words that mark a page as a promotional banner
pub const BANNER_KEYWORDS: [&str; 13] = [
    "processed",
    "verified",
    "banner",
    "watermark",
    "@",
    "telegram",
    "bot",
    "copyright",
    "©",
    "document processed",
    "pdf processing",
    "scanned by",
    "converted by",
];

/// A page with this many keyword hits is a banner wherever it sits
pub const BANNER_KEYWORD_THRESHOLD: usize = 3;
/// First/last pages with less text than this and at least one hit are banners
pub const BANNER_SHORT_TEXT_LEN: usize = 120;

const A4_WIDTH: f32 = 595.0;
const A4_HEIGHT: f32 = 842.0;
const PARENT_CHAIN_LIMIT: usize = 32;

/// Where banner pages go relative to the document
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BannerPlacement {
    Before,
    #[default]
    After,
}

/// Parse `bytes`, decrypting with `password` when the document is encrypted
pub fn open(bytes: &[u8], password: Option<&str>) -> Result<Document, PdfError> {
    let mut doc = Document::load_mem(bytes).map_err(|e| PdfError::Load(e.to_string()))?;

    if doc.is_encrypted() {
        let password = password.unwrap_or("");
        if doc.decrypt(password).is_err() {
            return Err(if password.is_empty() {
                PdfError::PasswordRequired
            } else {
                PdfError::WrongPassword
            });
        }
        doc.trailer.remove(b"Encrypt");
        debug!("Document decrypted");
    }

    Ok(doc)
}

/// Serialize the document
pub fn save(doc: &mut Document) -> Result<Vec<u8>, PdfError> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfError::Save(e.to_string()))?;
    Ok(buffer)
}

pub fn page_count(doc: &Document) -> u32 {
    doc.get_pages().len() as u32
}

/// Whether `bytes` is an encrypted PDF
pub fn is_encrypted(bytes: &[u8]) -> Result<bool, PdfError> {
    let doc = Document::load_mem(bytes).map_err(|e| PdfError::Load(e.to_string()))?;
    Ok(doc.is_encrypted())
}

/// Delete 1-based `pages`; numbers past the end are ignored.
///
/// Returns the pages actually removed. When none of `pages` exists the
/// document is left untouched and the list is empty.
pub fn remove_pages(doc: &mut Document, pages: &[u32]) -> Result<Vec<u32>, PdfError> {
    let total = page_count(doc);
    let mut targets: Vec<u32> = pages
        .iter()
        .copied()
        .filter(|p| (1..=total).contains(p))
        .collect();
    targets.sort_unstable();
    targets.dedup();

    if targets.is_empty() {
        debug!(requested = ?pages, total, "No requested page in range, nothing removed");
        return Ok(targets);
    }
    if targets.len() as u32 >= total {
        return Err(PdfError::WouldRemoveAllPages);
    }

    doc.delete_pages(&targets);
    doc.prune_objects();
    info!(removed = ?targets, remaining = total - targets.len() as u32, "Pages removed");
    Ok(targets)
}

/// Classify a page's text
pub fn is_banner_text(text: &str, edge_page: bool) -> bool {
    let lowered = text.to_lowercase();
    let hits = BANNER_KEYWORDS
        .iter()
        .filter(|keyword| lowered.contains(*keyword))
        .count();

    hits >= BANNER_KEYWORD_THRESHOLD
        || (edge_page && hits > 0 && text.trim().chars().count() < BANNER_SHORT_TEXT_LEN)
}

/// 1-based numbers of pages that look like banners
pub fn detect_banner_pages(doc: &Document) -> Vec<u32> {
    let total = page_count(doc);
    (1..=total)
        .filter(|page| {
            let text = doc.extract_text(&[*page]).unwrap_or_default();
            is_banner_text(&text, *page == 1 || *page == total)
        })
        .collect()
}

/// Remove detected banner pages; a document made only of banners is left alone.
///
/// Returns the number of removed pages.
pub fn clean_banners(doc: &mut Document) -> usize {
    let banners = detect_banner_pages(doc);
    if banners.is_empty() {
        return 0;
    }
    if banners.len() as u32 >= page_count(doc) {
        warn!(pages = banners.len(), "Every page looks like a banner, keeping document");
        return 0;
    }
    match remove_pages(doc, &banners) {
        Ok(removed) => removed.len(),
        Err(e) => {
            warn!(error = %e, "Banner removal failed, keeping document");
            0
        }
    }
}

/// Walk the page tree upwards for an inheritable attribute
fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..PARENT_CHAIN_LIMIT {
        let parent_id = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent_id).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
    }
    None
}

/// Copy every page of `banner` into `doc`; returns how many pages were added
pub fn append_banner(
    doc: &mut Document,
    banner: &Document,
    placement: BannerPlacement,
) -> Result<usize, PdfError> {
    let mut banner = banner.clone();
    banner.renumber_objects_with(doc.max_id + 1);

    let banner_page_ids: Vec<ObjectId> = banner.get_pages().into_values().collect();
    if banner_page_ids.is_empty() {
        return Ok(0);
    }

    let mut banner_pages = Vec::with_capacity(banner_page_ids.len());
    for page_id in &banner_page_ids {
        let mut page = banner.get_dictionary(*page_id)?.clone();
        for key in [&b"MediaBox"[..], b"Resources", b"CropBox", b"Rotate"] {
            if page.get(key).is_err() {
                if let Some(value) = inherited_attribute(&banner, *page_id, key) {
                    page.set(key, value);
                }
            }
        }
        banner_pages.push((*page_id, page));
    }

    doc.max_id = doc.max_id.max(banner.max_id);
    for (id, object) in banner.objects {
        doc.objects.entry(id).or_insert(object);
    }

    let pages_id = doc.catalog()?.get(b"Pages")?.as_reference()?;
    for (page_id, mut page) in banner_pages {
        page.set("Parent", pages_id);
        doc.objects.insert(page_id, Object::Dictionary(page));
    }

    let added = banner_page_ids.len();
    let references: Vec<Object> = banner_page_ids.into_iter().map(Object::Reference).collect();
    let pages = doc.get_object_mut(pages_id)?.as_dict_mut()?;
    let kids = pages.get_mut(b"Kids")?.as_array_mut()?;
    match placement {
        BannerPlacement::Before => {
            for (index, reference) in references.into_iter().enumerate() {
                kids.insert(index, reference);
            }
        }
        BannerPlacement::After => kids.extend(references),
    }
    let count = pages.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
    pages.set("Count", count + added as i64);

    doc.prune_objects();
    info!(added, placement = ?placement, "Banner pages appended");
    Ok(added)
}

/// Empty single-tree document with the given page dictionaries attached
fn document_with_pages(
    mut doc: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
) -> Document {
    let count = page_ids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.into_iter().map(Object::Reference).collect::<Vec<_>>(),
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

/// Build a document with one A4 page per entry, each entry a list of lines
pub fn text_pages_document(pages: &[Vec<String>]) -> Result<Document, PdfError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut page_ids = Vec::with_capacity(pages.len());
    for lines in pages {
        let mut operations = Vec::new();
        let mut y = A4_HEIGHT / 2.0 + (lines.len() as f32 * 14.0);
        for (index, line) in lines.iter().enumerate() {
            let size: i64 = if index == 0 { 28 } else { 14 };
            // Rough Helvetica advance for centering
            let width = line.chars().count() as f32 * size as f32 * 0.55;
            let x = ((A4_WIDTH - width) / 2.0).max(24.0);
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), size.into()]));
            operations.push(Operation::new("Td", vec![x.into(), y.into()]));
            operations.push(Operation::new("Tj", vec![Object::string_literal(line.as_str())]));
            operations.push(Operation::new("ET", vec![]));
            y -= size as f32 * 1.8;
        }
        let content = Content { operations };
        let encoded = content.encode().map_err(|e| PdfError::Save(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), A4_WIDTH.into(), A4_HEIGHT.into()],
        });
        page_ids.push(page_id);
    }

    Ok(document_with_pages(doc, pages_id, page_ids))
}

/// Banner used when the user has not uploaded one
pub fn default_banner(tag: Option<&str>, now: DateTime<Utc>) -> Result<Document, PdfError> {
    let headline = match tag.map(str::trim).filter(|t| !t.is_empty()) {
        Some(tag) => format!("Processed by {tag}"),
        None => "Document processed".to_string(),
    };
    let timestamp = now.format("%Y-%m-%d %H:%M UTC").to_string();
    text_pages_document(&[vec![headline, timestamp]])
}

/// Convert an image (PNG, JPEG, ...) into a one-page PDF scaled to A4 width
pub fn image_to_pdf(bytes: &[u8]) -> Result<Vec<u8>, PdfError> {
    let image = image::load_from_memory(bytes).map_err(|e| PdfError::Image(e.to_string()))?;
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return Err(PdfError::Image("empty image".to_string()));
    }

    let scale = A4_WIDTH / width as f32;
    let page_width = A4_WIDTH;
    let page_height = height as f32 * scale;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut image_stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        rgb.into_raw(),
    );
    image_stream
        .compress()
        .map_err(|e| PdfError::Image(e.to_string()))?;
    let image_id = doc.add_object(image_stream);

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    page_width.into(),
                    0.into(),
                    0.into(),
                    page_height.into(),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec!["Im0".into()]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content.encode().map_err(|e| PdfError::Save(e.to_string()))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! { "XObject" => dictionary! { "Im0" => image_id } },
        "MediaBox" => vec![0.into(), 0.into(), page_width.into(), page_height.into()],
    });

    let mut doc = document_with_pages(doc, pages_id, vec![page_id]);
    save(&mut doc)
}

/// Encrypt with `password` as both user and owner password (RC4 128-bit)
pub fn encrypt(doc: &mut Document, password: &str) -> Result<(), PdfError> {
    if doc.trailer.get(b"ID").is_err() {
        let id: [u8; 16] = rand::random();
        let id = Object::String(id.to_vec(), StringFormat::Hexadecimal);
        doc.trailer.set("ID", vec![id.clone(), id]);
    }

    let version = EncryptionVersion::V2 {
        document: &*doc,
        owner_password: password,
        user_password: password,
        key_length: 128,
        permissions: Permissions::all(),
    };
    let state = EncryptionState::try_from(version).map_err(|e| PdfError::Encrypt(e.to_string()))?;
    doc.encrypt(&state)
        .map_err(|e| PdfError::Encrypt(e.to_string()))?;
    info!("Document encrypted");
    Ok(())
}

/// Run blocking PDF work on the blocking pool, bounded by `timeout`
pub async fn run_blocking<T, F>(timeout: Duration, label: &str, work: F) -> Result<T, PdfError>
where
    F: FnOnce() -> Result<T, PdfError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(work)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(PdfError::Worker(join_error.to_string())),
        Err(_) => {
            warn!(step = %label, timeout_secs = timeout.as_secs(), "PDF step timed out");
            Err(PdfError::Timeout(label.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_banner_text_keyword_threshold() {
        assert!(is_banner_text(
            "Document processed by our Telegram bot, join @channel",
            false
        ));
        assert!(!is_banner_text("Chapter one. The bot was quiet.", false));
    }

    #[test]
    fn test_is_banner_text_short_edge_page() {
        assert!(is_banner_text("Join @channel", true));
        assert!(!is_banner_text("Join @channel", false));
        assert!(!is_banner_text("", true));
        assert!(!is_banner_text("Introduction", true));
    }

    #[test]
    fn test_text_pages_document_page_count() {
        let pages = vec![vec!["one".to_string()], vec!["two".to_string()]];
        let doc = text_pages_document(&pages).unwrap();
        assert_eq!(page_count(&doc), 2);
    }
}
