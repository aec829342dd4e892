//! # Task Registry Tests

use pdfbot::tasks::TaskRegistry;
use std::time::Duration;
use tokio::sync::oneshot;

#[tokio::test]
async fn test_cancel_aborts_running_tasks() {
    let registry = TaskRegistry::new();
    let (tx, rx) = oneshot::channel::<()>();

    registry.spawn(1, async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        let _ = tx.send(());
    });
    registry.spawn(1, async {
        tokio::time::sleep(Duration::from_secs(30)).await;
    });
    assert_eq!(registry.active(1), 2);

    assert_eq!(registry.cancel_user(1), 2);
    assert_eq!(registry.active(1), 0);
    // The aborted task dropped its sender without sending
    assert!(rx.await.is_err());
}

#[tokio::test]
async fn test_finished_tasks_deregister() {
    let registry = TaskRegistry::new();
    let (tx, rx) = oneshot::channel();

    registry.spawn(1, async move {
        let _ = tx.send(42);
    });
    assert_eq!(rx.await.unwrap(), 42);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(registry.active(1), 0);
    assert_eq!(registry.cancel_user(1), 0);
}

#[tokio::test]
async fn test_cancel_only_touches_one_user() {
    let registry = TaskRegistry::new();
    for user in [1, 2] {
        registry.spawn(user, async {
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
    }

    assert_eq!(registry.cancel_user(1), 1);
    assert_eq!(registry.active(2), 1);
    registry.cancel_user(2);
}
