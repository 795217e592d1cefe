use super::WindowEntry;
use std::time::{Duration, SystemTime};


mod periodic;
mod probabilistic;

pub use periodic::{PeriodicStore, PeriodicStoreBuilder};
pub use probabilistic::{ProbabilisticStore, ProbabilisticStoreBuilder};

/// Store trait for per-key window state
///
/// Entries carry an expiry of `now + ttl`. A store must never return an entry
/// whose expiry has passed; when it physically removes such entries is up to
/// the implementation.
pub trait Store {
    /// Get the live entry for a key
    fn get(&self, key: &str, now: SystemTime) -> Result<Option<WindowEntry>, String>;

    /// Insert or replace the entry for a key, expiring `ttl` after `now`
    fn set_with_ttl(
        &mut self,
        key: &str,
        entry: WindowEntry,
        ttl: Duration,
        now: SystemTime,
    ) -> Result<(), String>;

    /// Number of entries held, including stale ones not yet evicted
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
