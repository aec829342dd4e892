//! # Localization Tests
//!
//! Message retrieval, argument formatting and fallbacks, plus a check that
//! every key referenced from the sources exists in the English bundle.

use pdfbot::localization::{init_localization, t_args_lang, t_lang, LocalizationManager};
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

fn setup_localization() -> LocalizationManager {
    LocalizationManager::new().expect("Failed to create localization manager")
}

#[test]
fn test_get_message_existing_key() {
    let manager = setup_localization();

    let message = manager.get_message_in_language("welcome", "en", None);
    assert!(message.contains("PDF"));
    assert!(message.contains("/batch"));
}

#[test]
fn test_get_message_nonexistent_key() {
    let manager = setup_localization();

    let message = manager.get_message_in_language("nonexistent-key", "en", None);
    assert_eq!(message, "Missing translation: nonexistent-key");
}

#[test]
fn test_unsupported_language_falls_back_to_english() {
    let manager = setup_localization();

    let english = manager.get_message_in_language("error-busy", "en", None);
    assert_eq!(manager.get_message_in_language("error-busy", "xx", None), english);
    assert_eq!(manager.get_message_in_language("error-busy", "en-GB", None), english);
}

#[test]
fn test_message_with_args() {
    let manager = setup_localization();

    let mut args = HashMap::new();
    args.insert("max", "24");
    let message = manager.get_message("batch-started", Some(&args));
    assert!(message.contains("24"));
    assert!(!message.contains('\u{2068}'));

    let summary = manager.get_message_with_args(
        "batch-summary",
        None,
        &[("succeeded", "3"), ("failed", "1"), ("total", "4")],
    );
    assert!(summary.contains("3 succeeded"));
    assert!(summary.contains("1 failed"));
    assert!(summary.contains("of 4"));
}

#[test]
fn test_global_helpers() {
    init_localization().unwrap();

    assert_eq!(t_lang("operation-cancelled", Some("en")), "❌ Cancelled.");
    assert!(t_args_lang("admin-added", &[("id", "42")], None).contains("42"));
    assert!(t_lang("does-not-exist", None).starts_with("Missing translation:"));
}

fn collect_sources(dir: &Path, out: &mut Vec<String>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect_sources(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            out.push(fs::read_to_string(&path).unwrap());
        }
    }
}

/// Every key passed to the helpers or returned as a message key is defined
#[test]
fn test_all_referenced_keys_exist() {
    let manager = setup_localization();
    let mut sources = Vec::new();
    collect_sources(&Path::new(env!("CARGO_MANIFEST_DIR")).join("src"), &mut sources);

    let call = Regex::new(r#"t_(?:args_)?lang\(\s*"([a-z][a-z0-9-]*)""#).unwrap();
    let literal = Regex::new(
        r#""((?:error|prompt|button|result|batch|settings|position|delay|banner|password|cancel|status|join|admin|fsub|broadcast)-[a-z0-9-]+)""#,
    )
    .unwrap();

    let mut keys = BTreeSet::new();
    for source in &sources {
        for captures in call.captures_iter(source).chain(literal.captures_iter(source)) {
            keys.insert(captures[1].to_string());
        }
    }

    assert!(!keys.is_empty());
    let missing: Vec<&String> = keys.iter().filter(|key| !manager.has_message(key)).collect();
    assert!(missing.is_empty(), "Undefined localization keys: {missing:?}");
}
