//! # Batch Queue Tests

use anyhow::anyhow;
use pdfbot::batch::{BatchEntry, BatchQueue};
use pdfbot::errors::BatchError;

fn entry(name: &str) -> BatchEntry {
    BatchEntry {
        file_id: format!("id-{name}"),
        file_name: name.to_string(),
        size: 1024,
    }
}

#[test]
fn test_add_requires_batch_mode() {
    let queue = BatchQueue::new(24);
    assert_eq!(queue.add(1, entry("a.pdf")), Err(BatchError::NotActive));

    queue.start(1);
    assert_eq!(queue.add(1, entry("a.pdf")), Ok(1));
    assert_eq!(queue.add(1, entry("b.pdf")), Ok(2));
}

#[test]
fn test_add_rejects_past_maximum() {
    let queue = BatchQueue::new(2);
    queue.start(1);
    queue.add(1, entry("a.pdf")).unwrap();
    queue.add(1, entry("b.pdf")).unwrap();

    assert_eq!(queue.add(1, entry("c.pdf")), Err(BatchError::Full { max: 2 }));
    assert_eq!(queue.len(1), 2);
}

#[test]
fn test_drain_returns_entries_in_order_and_empties() {
    let queue = BatchQueue::new(24);
    queue.start(1);
    for name in ["a.pdf", "b.pdf", "c.pdf"] {
        queue.add(1, entry(name)).unwrap();
    }

    let names: Vec<String> = queue.drain(1).into_iter().map(|e| e.file_name).collect();
    assert_eq!(names, vec!["a.pdf", "b.pdf", "c.pdf"]);
    assert!(queue.is_empty(1));
    assert!(queue.is_active(1));
}

#[test]
fn test_start_resets_queue_and_stop_leaves_batch_mode() {
    let queue = BatchQueue::new(24);
    queue.start(1);
    queue.add(1, entry("a.pdf")).unwrap();

    queue.start(1);
    assert!(queue.is_empty(1));

    assert!(queue.stop(1));
    assert!(!queue.is_active(1));
    assert!(!queue.stop(1));
}

#[test]
fn test_queues_are_per_user() {
    let queue = BatchQueue::new(24);
    queue.start(1);
    queue.start(2);
    queue.add(1, entry("a.pdf")).unwrap();

    assert_eq!(queue.len(1), 1);
    assert_eq!(queue.len(2), 0);
    assert_eq!(queue.clear(1), 1);
}

#[tokio::test]
async fn test_process_tallies_failures_and_drains() {
    let queue = BatchQueue::new(24);
    queue.start(1);
    for name in ["a.pdf", "bad-1.pdf", "c.pdf", "bad-2.pdf", "e.pdf"] {
        queue.add(1, entry(name)).unwrap();
    }

    let mut seen = Vec::new();
    let report = queue
        .process(1, |entry| {
            seen.push(entry.file_name.clone());
            async move {
                if entry.file_name.starts_with("bad") {
                    Err(anyhow!("corrupt file"))
                } else {
                    Ok(())
                }
            }
        })
        .await;

    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed_count(), 2);
    assert_eq!(report.total(), 5);
    assert_eq!(report.failed[0].file_name, "bad-1.pdf");
    assert_eq!(report.failed[0].error, "corrupt file");
    assert_eq!(seen, vec!["a.pdf", "bad-1.pdf", "c.pdf", "bad-2.pdf", "e.pdf"]);
    assert!(queue.is_empty(1));
}

#[tokio::test]
async fn test_process_empty_queue() {
    let queue = BatchQueue::new(24);
    queue.start(1);

    let report = queue.process(1, |_| async { Ok(()) }).await;
    assert_eq!(report.total(), 0);
}
