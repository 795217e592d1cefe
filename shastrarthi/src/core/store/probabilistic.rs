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
const DEFAULT_CLEANUP_PROBABILITY: u64 = 1000; // 0.1% chance

/// Probabilistic cleanup store implementation
///
/// Every write has a 1-in-N chance of sweeping out stale windows. There is no
/// clock-driven schedule, so the cost of eviction is spread over writes.
///
/// # Example
///
/// ```
/// use shastrarthi::ProbabilisticStore;
///
/// let store = ProbabilisticStore::builder()
///     .capacity(200_000)
///     .cleanup_probability(10_000) // 1 in 10,000 writes
///     .build();
/// ```
pub struct ProbabilisticStore {
    data: HashMap<String, (WindowEntry, SystemTime)>,
    operations_count: u64,
    cleanup_probability: u64,
}

/// Builder for configuring a ProbabilisticStore
pub struct ProbabilisticStoreBuilder {
    capacity: usize,
    cleanup_probability: u64,
}

impl ProbabilisticStore {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ProbabilisticStoreBuilder {
        ProbabilisticStoreBuilder::default()
    }

    fn maybe_cleanup(&mut self, now: SystemTime) {
        self.operations_count = self.operations_count.wrapping_add(1);

        // Deterministic pseudo-random spread over the operation counter
        let hash = self.operations_count.wrapping_mul(2654435761);
        if hash % self.cleanup_probability == 0 {
            self.data.retain(|_, (_, expiry)| *expiry > now);
        }
    }
}

impl Default for ProbabilisticStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for ProbabilisticStore {
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
        self.maybe_cleanup(now);
        self.data.insert(key.to_string(), (entry, now + ttl));
        Ok(())
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

impl Default for ProbabilisticStoreBuilder {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            cleanup_probability: DEFAULT_CLEANUP_PROBABILITY,
        }
    }
}

impl ProbabilisticStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the expected capacity (number of unique keys)
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sweep on roughly one write in `probability`
    ///
    /// Values below 1 are treated as 1 (sweep on every write).
    pub fn cleanup_probability(mut self, probability: u64) -> Self {
        self.cleanup_probability = probability.max(1);
        self
    }

    pub fn build(self) -> ProbabilisticStore {
        ProbabilisticStore {
            data: HashMap::with_capacity(
                (self.capacity as f64 * CAPACITY_OVERHEAD_FACTOR) as usize,
            ),
            operations_count: 0,
            cleanup_probability: self.cleanup_probability,
        }
    }
}
