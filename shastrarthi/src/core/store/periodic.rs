use super::Store;
use crate::core::WindowEntry;
use std::time::{Duration, SystemTime};

#[cfg(feature = "ahash")]
use ahash::AHashMap as HashMap;
#[cfg(not(feature = "ahash"))]
use std::collections::HashMap;

// Configuration constants
const DEFAULT_CAPACITY: usize = 1000;
const CAPACITY_OVERHEAD_FACTOR: f64 = 1.3;
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;

/// Fixed-interval cleanup store implementation
///
/// This store sweeps out windows that have elapsed at regular, predictable
/// intervals. Memory stays bounded by the keys seen during roughly one window
/// plus one cleanup interval.
///
/// # Example
///
/// ```
/// use shastrarthi::{RateLimiter, PeriodicStore};
///
/// // Sweep stale windows every 5 minutes
/// let store = PeriodicStore::builder()
///     .cleanup_interval(std::time::Duration::from_secs(300))
///     .build();
/// let mut limiter = RateLimiter::new(store);
/// ```
pub struct PeriodicStore {
    data: HashMap<String, (WindowEntry, SystemTime)>,
    // When the next sweep is due
    next_cleanup: SystemTime,
    cleanup_interval: Duration,
    // Entries removed by the most recent sweep
    expired_count: usize,
}

/// Builder for configuring a PeriodicStore
///
/// # Example
///
/// ```
/// use shastrarthi::PeriodicStore;
/// use std::time::Duration;
///
/// let store = PeriodicStore::builder()
///     .capacity(100_000)
///     .cleanup_interval(Duration::from_secs(120))
///     .build();
/// ```
pub struct PeriodicStoreBuilder {
    capacity: usize,
    cleanup_interval: Duration,
}

impl PeriodicStore {
    /// Create a new PeriodicStore with default configuration
    ///
    /// Uses a default capacity of 1000 entries and cleanup interval of 60 seconds.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a new builder for configuring a PeriodicStore
    pub fn builder() -> PeriodicStoreBuilder {
        PeriodicStoreBuilder::default()
    }

    fn with_config(capacity: usize, cleanup_interval: Duration) -> Self {
        PeriodicStore {
            // Pre-allocate with overhead to avoid rehashing
            data: HashMap::with_capacity((capacity as f64 * CAPACITY_OVERHEAD_FACTOR) as usize),
            next_cleanup: SystemTime::now() + cleanup_interval,
            cleanup_interval,
            expired_count: 0,
        }
    }

    /// Entries removed by the most recent sweep
    pub fn expired_count(&self) -> usize {
        self.expired_count
    }

    fn maybe_clean_expired(&mut self, now: SystemTime) {
        if now >= self.next_cleanup {
            let before_count = self.data.len();
            self.data.retain(|_, (_, expiry)| *expiry > now);
            self.expired_count = before_count.saturating_sub(self.data.len());
            self.next_cleanup = now + self.cleanup_interval;
        }
    }
}

impl Default for PeriodicStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for PeriodicStore {
    fn get(&self, key: &str, now: SystemTime) -> Result<Option<WindowEntry>, String> {
        match self.data.get(key) {
            Some((entry, expiry)) if *expiry > now => Ok(Some(*entry)),
            _ => Ok(None),
        }
    }

    fn set_with_ttl(
        &mut self,
        key: &str,
        entry: WindowEntry,
        ttl: Duration,
        now: SystemTime,
    ) -> Result<(), String> {
        // Only sweep when the interval has passed, not on every write
        self.maybe_clean_expired(now);

        match self.data.get_mut(key) {
            Some(slot) => *slot = (entry, now + ttl),
            None => {
                self.data.insert(key.to_string(), (entry, now + ttl));
            }
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

impl Default for PeriodicStoreBuilder {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
        }
    }
}

impl PeriodicStoreBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the expected capacity (number of unique keys)
    ///
    /// The store will allocate 30% more space to reduce hash collisions.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the interval between sweeps
    ///
    /// Shorter intervals mean tighter memory usage but more frequent full scans.
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Build the PeriodicStore with the configured settings
    pub fn build(self) -> PeriodicStore {
        PeriodicStore::with_config(self.capacity, self.cleanup_interval)
    }
}
