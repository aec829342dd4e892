//! # Rate Limiter Tests

use pdfbot::config::RateLimitConfig;
use pdfbot::errors::LimitError;
use pdfbot::rate_limit::{ActionKind, RateLimiter};
use std::time::{Duration, Instant};

fn limiter(per_minute: usize, batch_per_minute: usize) -> RateLimiter {
    RateLimiter::new(RateLimitConfig {
        per_minute,
        batch_per_minute,
        ..RateLimitConfig::default()
    })
}

#[test]
fn test_window_limit() {
    let limiter = limiter(3, 10);
    let now = Instant::now();

    for id in 0..3 {
        assert!(limiter.check_at(now, 1, Some(id), ActionKind::Other, false).is_ok());
    }
    assert_eq!(
        limiter.check_at(now, 1, Some(3), ActionKind::Other, false),
        Err(LimitError::RateLimited)
    );

    // Another user is unaffected
    assert!(limiter.check_at(now, 2, Some(3), ActionKind::Other, false).is_ok());
}

#[test]
fn test_window_slides() {
    let limiter = limiter(2, 10);
    let start = Instant::now();

    limiter.check_at(start, 1, None, ActionKind::Other, false).unwrap();
    limiter.check_at(start, 1, None, ActionKind::Other, false).unwrap();
    assert!(limiter.check_at(start, 1, None, ActionKind::Other, false).is_err());

    let later = start + Duration::from_secs(61);
    assert!(limiter.check_at(later, 1, None, ActionKind::Other, false).is_ok());
}

#[test]
fn test_batch_mode_raises_limit() {
    let limiter = limiter(2, 5);
    let now = Instant::now();

    for _ in 0..5 {
        assert!(limiter.check_at(now, 1, None, ActionKind::Other, true).is_ok());
    }
    assert_eq!(
        limiter.check_at(now, 1, None, ActionKind::Other, true),
        Err(LimitError::RateLimited)
    );
}

#[test]
fn test_repeated_message_id_is_duplicate() {
    let limiter = limiter(30, 100);
    let now = Instant::now();

    limiter.check_at(now, 1, Some(42), ActionKind::Other, false).unwrap();
    assert_eq!(
        limiter.check_at(now, 1, Some(42), ActionKind::Other, false),
        Err(LimitError::Duplicate)
    );

    let much_later = now + Duration::from_secs(301);
    assert!(limiter.check_at(much_later, 1, Some(42), ActionKind::Other, false).is_ok());
}

#[test]
fn test_command_cooldown() {
    let limiter = limiter(30, 100);
    let now = Instant::now();

    limiter.check_at(now, 1, Some(1), ActionKind::Start, false).unwrap();
    assert_eq!(
        limiter.check_at(now + Duration::from_millis(500), 1, Some(2), ActionKind::Start, false),
        Err(LimitError::Duplicate)
    );
    // Different command, no cooldown clash
    assert!(limiter
        .check_at(now + Duration::from_millis(500), 1, Some(3), ActionKind::Batch, false)
        .is_ok());
    assert!(limiter
        .check_at(now + Duration::from_secs(3), 1, Some(4), ActionKind::Start, false)
        .is_ok());
}

#[test]
fn test_duplicates_do_not_consume_window() {
    let limiter = limiter(2, 10);
    let now = Instant::now();

    limiter.check_at(now, 1, Some(1), ActionKind::Other, false).unwrap();
    for _ in 0..5 {
        let _ = limiter.check_at(now, 1, Some(1), ActionKind::Other, false);
    }
    assert!(limiter.check_at(now, 1, Some(2), ActionKind::Other, false).is_ok());
}
