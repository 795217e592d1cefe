use super::{LimitError, PeriodicStore, ProbabilisticStore, RateLimitOptions, RateLimiter};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn ai_limit() -> RateLimitOptions {
    RateLimitOptions::from_millis(60_000, 20)
}

#[test]
fn test_first_request_opens_window() {
    let mut limiter = RateLimiter::new(PeriodicStore::new());

    let now = SystemTime::now();
    let result = limiter.check("test", &ai_limit(), now).unwrap();
    assert!(result.allowed);
    assert_eq!(result.limit, 20);
    assert_eq!(result.remaining, 19);
    assert_eq!(result.retry_after_seconds, 0);
}

#[test]
fn test_exhausting_the_window() {
    let mut limiter = RateLimiter::new(PeriodicStore::new());
    let options = RateLimitOptions::from_millis(60_000, 5);

    let now = SystemTime::now();
    let mut previous_remaining = u64::MAX;
    for i in 0..5 {
        let result = limiter.check("burst_test", &options, now).unwrap();
        assert!(result.allowed, "Request {} should be allowed", i + 1);
        assert_eq!(result.remaining, 5 - (i + 1));
        assert!(result.remaining < previous_remaining);
        previous_remaining = result.remaining;
    }

    // 6th request should be blocked
    let result = limiter.check("burst_test", &options, now).unwrap();
    assert!(!result.allowed);
    assert_eq!(result.remaining, 0);
    assert_eq!(result.retry_after_seconds, 60);
}

#[test]
fn test_denied_requests_do_not_extend_window() {
    let mut limiter = RateLimiter::new(PeriodicStore::new());
    let options = RateLimitOptions::from_millis(10_000, 1);

    let start = SystemTime::now();
    assert!(limiter.check("key", &options, start).unwrap().allowed);

    let first_denial = limiter
        .check("key", &options, start + Duration::from_secs(2))
        .unwrap();
    let second_denial = limiter
        .check("key", &options, start + Duration::from_secs(5))
        .unwrap();
    assert!(!first_denial.allowed);
    assert!(!second_denial.allowed);
    assert_eq!(
        first_denial.reset_at_unix_seconds,
        second_denial.reset_at_unix_seconds
    );
    assert_eq!(first_denial.retry_after_seconds, 8);
    assert_eq!(second_denial.retry_after_seconds, 5);
}

#[test]
fn test_retry_after_is_at_least_one_second() {
    let mut limiter = RateLimiter::new(PeriodicStore::new());
    let options = RateLimitOptions::from_millis(1_000, 1);

    let start = SystemTime::now();
    limiter.check("key", &options, start).unwrap();

    // 1ms before the window closes
    let result = limiter
        .check("key", &options, start + Duration::from_millis(999))
        .unwrap();
    assert!(!result.allowed);
    assert_eq!(result.retry_after_seconds, 1);

    // Sub-millisecond remainder still rounds up to one second
    let result = limiter
        .check("key", &options, start + Duration::from_nanos(999_999_999))
        .unwrap();
    assert!(!result.allowed);
    assert_eq!(result.retry_after_seconds, 1);
}

#[test]
fn test_window_resets_after_expiry() {
    let mut limiter = RateLimiter::new(PeriodicStore::new());
    let options = RateLimitOptions::from_millis(60_000, 3);

    let start = SystemTime::now();
    for _ in 0..10 {
        limiter.check("reset_test", &options, start).unwrap();
    }
    assert!(!limiter.check("reset_test", &options, start).unwrap().allowed);

    // Exactly at the boundary the window counts as expired
    let boundary = start + Duration::from_millis(60_000);
    let result = limiter.check("reset_test", &options, boundary).unwrap();
    assert!(result.allowed);
    assert_eq!(result.remaining, 2);
}

#[test]
fn test_burst_across_window_boundary() {
    let mut limiter = RateLimiter::new(PeriodicStore::new());
    let options = RateLimitOptions::from_millis(60_000, 4);

    let start = SystemTime::now();
    // First request opens the window, the rest of the budget is spent at its end
    assert!(limiter.check("edge", &options, start).unwrap().allowed);
    let late = start + Duration::from_millis(59_999);
    for _ in 0..3 {
        assert!(limiter.check("edge", &options, late).unwrap().allowed);
    }

    // Immediately after the boundary a full new budget is available
    let next = start + Duration::from_millis(60_000);
    let allowed = (0..4)
        .filter(|_| limiter.check("edge", &options, next).unwrap().allowed)
        .count();
    assert_eq!(allowed, 4);
}

#[test]
fn test_different_keys_are_independent() {
    let mut limiter = RateLimiter::new(PeriodicStore::new());
    let options = RateLimitOptions::from_millis(60_000, 2);

    let now = SystemTime::now();
    for _ in 0..5 {
        limiter.check("key_a", &options, now).unwrap();
    }
    assert!(!limiter.check("key_a", &options, now).unwrap().allowed);

    let result = limiter.check("key_b", &options, now).unwrap();
    assert!(result.allowed);
    assert_eq!(result.remaining, 1);
}

#[test]
fn test_reset_timestamp() {
    let mut limiter = RateLimiter::new(PeriodicStore::new());
    let options = RateLimitOptions::from_millis(60_000, 20);

    let start = UNIX_EPOCH + Duration::from_millis(1_700_000_000_500);
    let result = limiter.check("key", &options, start).unwrap();
    // 1_700_000_060.5 rounds up
    assert_eq!(result.reset_at_unix_seconds, 1_700_000_061);

    let later = limiter
        .check("key", &options, start + Duration::from_secs(30))
        .unwrap();
    assert_eq!(later.reset_at_unix_seconds, 1_700_000_061);
}

#[test]
fn test_single_request_limit() {
    let mut limiter = RateLimiter::new(ProbabilisticStore::new());
    let options = RateLimitOptions::from_millis(1_000, 1);

    let now = SystemTime::now();
    let first = limiter.check("one", &options, now).unwrap();
    assert!(first.allowed);
    assert_eq!(first.remaining, 0);
    assert!(!limiter.check("one", &options, now).unwrap().allowed);
}

#[test]
fn test_invalid_options() {
    let mut limiter = RateLimiter::new(PeriodicStore::new());
    let now = SystemTime::now();

    let zero_window = RateLimitOptions::new(Duration::ZERO, 10);
    assert!(matches!(
        limiter.check("key", &zero_window, now),
        Err(LimitError::InvalidWindow)
    ));

    let zero_limit = RateLimitOptions::from_millis(1_000, 0);
    assert!(matches!(
        limiter.check("key", &zero_limit, now),
        Err(LimitError::InvalidLimit)
    ));

    // Rejected checks leave no trace in the store
    assert_eq!(limiter.tracked_keys(), 0);
}

#[test]
fn test_stale_keys_are_evicted() {
    let store = PeriodicStore::builder()
        .cleanup_interval(Duration::from_secs(1))
        .build();
    let mut limiter = RateLimiter::new(store);
    let options = RateLimitOptions::from_millis(500, 5);

    let now = SystemTime::now();
    for i in 0..100 {
        limiter
            .check(&format!("ai:user-{i}:127.0.0.1"), &options, now)
            .unwrap();
    }
    assert_eq!(limiter.tracked_keys(), 100);

    let later = now + Duration::from_secs(2);
    limiter.check("ai:late:127.0.0.1", &options, later).unwrap();
    assert_eq!(limiter.tracked_keys(), 1);
}
