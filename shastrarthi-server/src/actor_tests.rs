#[cfg(test)]
mod tests {
    use crate::actor::RateLimiterActor;
    use shastrarthi::{PeriodicStore, ProbabilisticStore, RateLimitOptions};
    use std::time::{Duration, SystemTime};

    fn periodic_handle() -> crate::actor::RateLimiterHandle {
        let store = PeriodicStore::builder()
            .capacity(1000)
            .cleanup_interval(Duration::from_secs(60))
            .build();
        RateLimiterActor::spawn_periodic(100, store)
    }

    #[tokio::test]
    async fn test_basic_rate_limiting() {
        let handle = periodic_handle();
        let options = RateLimitOptions::from_millis(60_000, 5);

        let resp = handle.check("test".to_string(), options).await.unwrap();
        assert!(resp.allowed);
        assert_eq!(resp.limit, 5);
        assert_eq!(resp.remaining, 4);
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_counted_exactly() {
        let handle = periodic_handle();
        let options = RateLimitOptions::from_millis(60_000, 10);
        let now = SystemTime::now();

        let mut handles = vec![];
        for _ in 0..50 {
            let h = handle.clone();
            handles.push(tokio::spawn(async move {
                h.check_at("ai:user:ip".to_string(), options, now).await
            }));
        }

        let mut allowed_count = 0;
        for h in handles {
            if h.await.unwrap().unwrap().allowed {
                allowed_count += 1;
            }
        }

        // No undercounting under concurrency: exactly the ceiling gets through
        assert_eq!(allowed_count, 10);
    }

    #[tokio::test]
    async fn test_invalid_options_surface_as_errors() {
        let handle = periodic_handle();
        let options = RateLimitOptions::from_millis(60_000, 0);

        let err = handle.check("key".to_string(), options).await.unwrap_err();
        assert!(err.to_string().contains("Rate limit check failed"));
    }

    #[tokio::test]
    async fn test_tracked_keys() {
        let handle = RateLimiterActor::spawn_probabilistic(16, ProbabilisticStore::new());
        let options = RateLimitOptions::from_millis(60_000, 5);

        for key in ["a", "b", "c"] {
            handle.check(key.to_string(), options).await.unwrap();
        }
        handle.check("a".to_string(), options).await.unwrap();

        assert_eq!(handle.tracked_keys().await.unwrap(), 3);
    }
}
