//! # PDF and Pipeline Integration Tests
//!
//! Documents are generated in memory, so these tests need no fixtures.

use pdfbot::errors::PdfError;
use pdfbot::pages::PageSelection;
use pdfbot::pdf;
use pdfbot::pipeline::{self, FullProcessRequest, LockChoice, Operation, PipelineContext};

fn document_bytes(texts: &[&str]) -> Vec<u8> {
    let pages: Vec<Vec<String>> = texts.iter().map(|t| vec![t.to_string()]).collect();
    let mut doc = pdf::text_pages_document(&pages).unwrap();
    pdf::save(&mut doc).unwrap()
}

fn page_count_of(bytes: &[u8]) -> u32 {
    let doc = pdf::open(bytes, None).unwrap();
    pdf::page_count(&doc)
}

#[test]
fn test_remove_pages_ignores_out_of_range() {
    let bytes = document_bytes(&["one", "two", "three", "four", "five"]);
    let mut doc = pdf::open(&bytes, None).unwrap();

    let removed = pdf::remove_pages(&mut doc, &[2, 4, 4, 99]).unwrap();

    assert_eq!(removed, vec![2, 4]);
    assert_eq!(pdf::page_count(&doc), 3);
    let saved = pdf::save(&mut doc).unwrap();
    assert_eq!(page_count_of(&saved), 3);
}

#[test]
fn test_remove_pages_out_of_range_and_total_removal() {
    let bytes = document_bytes(&["one", "two"]);
    let mut doc = pdf::open(&bytes, None).unwrap();

    assert_eq!(pdf::remove_pages(&mut doc, &[7, 8]), Ok(vec![]));
    assert_eq!(pdf::page_count(&doc), 2);
    assert_eq!(
        pdf::remove_pages(&mut doc, &[1, 2]),
        Err(PdfError::WouldRemoveAllPages)
    );
    assert_eq!(pdf::page_count(&doc), 2);
}

#[test]
fn test_open_rejects_garbage() {
    let result = pdf::open(b"definitely not a pdf", None);
    assert!(matches!(result, Err(PdfError::Load(_))));
}

#[test]
fn test_append_banner_adds_pages_at_end() {
    let bytes = document_bytes(&["one", "two"]);
    let mut doc = pdf::open(&bytes, None).unwrap();
    let banner = pdf::default_banner(Some("@tester"), chrono::Utc::now()).unwrap();

    let added = pdf::append_banner(&mut doc, &banner, pdf::BannerPlacement::After).unwrap();

    assert_eq!(added, 1);
    let saved = pdf::save(&mut doc).unwrap();
    assert_eq!(page_count_of(&saved), 3);
}

#[test]
fn test_clean_banners_keeps_content_pages() {
    let bytes = document_bytes(&["Processed by @pdf_bot on Telegram", "Chapter one", "Chapter two"]);
    let mut doc = pdf::open(&bytes, None).unwrap();

    assert_eq!(pdf::clean_banners(&mut doc), 1);
    assert_eq!(pdf::page_count(&doc), 2);
}

#[test]
fn test_clean_banners_leaves_all_banner_document() {
    let bytes = document_bytes(&["Processed by @pdf_bot on Telegram"]);
    let mut doc = pdf::open(&bytes, None).unwrap();

    assert_eq!(pdf::clean_banners(&mut doc), 0);
    assert_eq!(pdf::page_count(&doc), 1);
}

#[test]
fn test_image_to_pdf_produces_single_page() {
    let image = image::RgbImage::from_pixel(4, 2, image::Rgb([200, 30, 30]));
    let mut png = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut png, image::ImageOutputFormat::Png)
        .unwrap();

    let bytes = pdf::image_to_pdf(png.get_ref()).unwrap();
    assert_eq!(page_count_of(&bytes), 1);
}

#[test]
fn test_image_to_pdf_rejects_non_image() {
    assert!(matches!(
        pdf::image_to_pdf(b"nope"),
        Err(PdfError::Image(_))
    ));
}

#[tokio::test]
async fn test_execute_remove_pages() {
    let bytes = document_bytes(&["one", "two", "three", "four"]);
    let operation = Operation::RemovePages {
        pages: PageSelection::List(vec![1, 3]),
    };

    let processed = pipeline::execute(&operation, bytes, &PipelineContext::default())
        .await
        .unwrap();

    assert_eq!(processed.report.pages_removed, vec![1, 3]);
    assert_eq!(page_count_of(&processed.bytes), 2);
}

#[tokio::test]
async fn test_execute_quick_pick_last_page() {
    let bytes = document_bytes(&["one", "two", "three"]);
    let operation = Operation::RemovePages {
        pages: PageSelection::Last,
    };

    let processed = pipeline::execute(&operation, bytes, &PipelineContext::default())
        .await
        .unwrap();

    assert_eq!(processed.report.pages_removed, vec![3]);
}

#[tokio::test]
async fn test_execute_unlock_on_plain_document_is_noop() {
    let bytes = document_bytes(&["one"]);
    let operation = Operation::Unlock {
        password: "secret".to_string(),
    };

    let processed = pipeline::execute(&operation, bytes.clone(), &PipelineContext::default())
        .await
        .unwrap();

    assert!(!processed.report.unlocked);
    assert_eq!(processed.bytes, bytes);
}

#[tokio::test]
async fn test_execute_add_banner_requires_banner() {
    let bytes = document_bytes(&["one"]);

    let result = pipeline::execute(&Operation::AddBanner, bytes, &PipelineContext::default()).await;

    assert!(matches!(result, Err(PdfError::NoBanner)));
}

#[tokio::test]
async fn test_execute_add_banner_with_user_banner() {
    let bytes = document_bytes(&["Chapter one", "Chapter two"]);
    let ctx = PipelineContext {
        banner: Some(document_bytes(&["Thanks for reading"])),
        ..PipelineContext::default()
    };

    let processed = pipeline::execute(&Operation::AddBanner, bytes, &ctx).await.unwrap();

    assert_eq!(processed.report.banner_pages_added, 1);
    assert_eq!(processed.report.banners_removed, 0);
    assert_eq!(page_count_of(&processed.bytes), 3);
}

#[tokio::test]
async fn test_execute_lock_without_password_passes_through() {
    let bytes = document_bytes(&["one"]);

    let processed = pipeline::execute(&Operation::Lock, bytes.clone(), &PipelineContext::default())
        .await
        .unwrap();

    assert!(processed.report.missing_lock_password);
    assert!(!processed.report.locked);
    assert_eq!(processed.bytes, bytes);
}

#[tokio::test]
async fn test_execute_lock_with_default_password() {
    let bytes = document_bytes(&["one"]);
    let ctx = PipelineContext {
        default_lock_password: Some("hunter2".to_string()),
        ..PipelineContext::default()
    };

    let processed = pipeline::execute(&Operation::Lock, bytes.clone(), &ctx).await.unwrap();

    assert!(processed.report.locked);
    assert_ne!(processed.bytes, bytes);
}

#[tokio::test]
async fn test_full_process_adds_default_banner_and_removes_pages() {
    let bytes = document_bytes(&["one", "two", "three"]);
    let operation = Operation::FullProcess(FullProcessRequest {
        unlock_password: None,
        pages: PageSelection::List(vec![2]),
        lock: LockChoice::Skip,
    });
    let ctx = PipelineContext {
        tag: Some("@tester".to_string()),
        ..PipelineContext::default()
    };

    let processed = pipeline::execute(&operation, bytes, &ctx).await.unwrap();

    assert_eq!(processed.report.banner_pages_added, 1);
    assert_eq!(processed.report.pages_removed, vec![2]);
    assert!(!processed.report.locked);
    assert!(!processed.report.missing_lock_password);
    assert_eq!(page_count_of(&processed.bytes), 3);
}

#[tokio::test]
async fn test_full_process_defaults_flag_missing_password() {
    let bytes = document_bytes(&["one", "two"]);
    let operation = Operation::FullProcess(FullProcessRequest::with_defaults());

    let processed = pipeline::execute(&operation, bytes, &PipelineContext::default())
        .await
        .unwrap();

    assert!(processed.report.missing_lock_password);
    assert!(processed.report.pages_removed.is_empty());
}

#[tokio::test]
async fn test_full_process_keeps_pages_when_selection_out_of_range() {
    let bytes = document_bytes(&["one", "two"]);
    let operation = Operation::FullProcess(FullProcessRequest {
        unlock_password: None,
        pages: PageSelection::List(vec![40]),
        lock: LockChoice::Skip,
    });

    let processed = pipeline::execute(&operation, bytes, &PipelineContext::default())
        .await
        .unwrap();

    assert!(processed.report.pages_removed.is_empty());
    assert_eq!(processed.report.banner_pages_added, 1);
    assert_eq!(page_count_of(&processed.bytes), 3);
}

#[tokio::test]
async fn test_execute_remove_pages_out_of_range_keeps_document() {
    let bytes = document_bytes(&["one", "two"]);
    let operation = Operation::RemovePages {
        pages: PageSelection::List(vec![5, 9]),
    };

    let processed = pipeline::execute(&operation, bytes.clone(), &PipelineContext::default())
        .await
        .unwrap();

    assert!(processed.report.pages_removed.is_empty());
    assert_eq!(processed.bytes, bytes);
}

#[tokio::test]
async fn test_lock_then_unlock_round_trip() {
    let bytes = document_bytes(&["one", "two"]);
    let ctx = PipelineContext {
        default_lock_password: Some("hunter2".to_string()),
        ..PipelineContext::default()
    };
    let locked = pipeline::execute(&Operation::Lock, bytes, &ctx).await.unwrap().bytes;

    assert!(pdf::is_encrypted(&locked).unwrap());
    assert!(matches!(pdf::open(&locked, None), Err(PdfError::PasswordRequired)));

    let wrong = Operation::Unlock {
        password: "wrong".to_string(),
    };
    let result = pipeline::execute(&wrong, locked.clone(), &PipelineContext::default()).await;
    assert!(matches!(result, Err(PdfError::WrongPassword)));

    let right = Operation::Unlock {
        password: "hunter2".to_string(),
    };
    let processed = pipeline::execute(&right, locked, &PipelineContext::default())
        .await
        .unwrap();

    assert!(processed.report.unlocked);
    assert!(!pdf::is_encrypted(&processed.bytes).unwrap());
    assert_eq!(page_count_of(&processed.bytes), 2);
}
