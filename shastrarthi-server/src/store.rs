//! Store factory for creating rate limiter instances
//!
//! # Store Types
//!
//! ## Periodic Store
//! - Stale windows are swept at fixed intervals
//! - Predictable memory usage patterns
//! - Best for: Consistent workloads with predictable traffic
//!
//! ## Probabilistic Store
//! - Stale windows are swept on a random fraction of writes
//! - Lower overhead but less predictable
//! - Best for: Bursty workloads where sweep timing isn't critical

use crate::actor::{RateLimiterActor, RateLimiterHandle};
use crate::config::{StoreConfig, StoreType};
use shastrarthi::{PeriodicStore, ProbabilisticStore};
use std::time::Duration;

/// Create a rate limiter actor with the configured store
///
/// # Example
///
/// ```ignore
/// let config = StoreConfig {
///     store_type: StoreType::Periodic,
///     capacity: 100_000,
///     // ... other fields
/// };
/// let limiter = create_rate_limiter(&config, 10_000);
/// ```
pub fn create_rate_limiter(config: &StoreConfig, buffer_size: usize) -> RateLimiterHandle {
    match config.store_type {
        StoreType::Periodic => {
            let store = PeriodicStore::builder()
                .capacity(config.capacity)
                .cleanup_interval(Duration::from_secs(config.cleanup_interval))
                .build();
            RateLimiterActor::spawn_periodic(buffer_size, store)
        }
        StoreType::Probabilistic => {
            let store = ProbabilisticStore::builder()
                .capacity(config.capacity)
                .cleanup_probability(config.cleanup_probability)
                .build();
            RateLimiterActor::spawn_probabilistic(buffer_size, store)
        }
    }
}
