//! Fixed-window parameters and the per-key counter entry

use std::time::{Duration, SystemTime};

/// How many requests a key may make per window
///
/// # Example
///
/// ```
/// use shastrarthi::RateLimitOptions;
/// use std::time::Duration;
///
/// // 20 requests per minute
/// let options = RateLimitOptions::new(Duration::from_secs(60), 20);
/// assert_eq!(options.max_requests, 20);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitOptions {
    /// Length of one fixed window
    pub window: Duration,
    /// Requests allowed inside one window
    pub max_requests: u64,
}

impl RateLimitOptions {
    pub fn new(window: Duration, max_requests: u64) -> Self {
        Self {
            window,
            max_requests,
        }
    }

    /// Build options from a window expressed in milliseconds
    pub fn from_millis(window_ms: u64, max_requests: u64) -> Self {
        Self::new(Duration::from_millis(window_ms), max_requests)
    }
}

/// Counter state stored for a single key
///
/// An entry is live while `now < window_started_at + window`. Once the window
/// has elapsed the entry is stale and the next request replaces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowEntry {
    /// Requests observed in the current window
    pub count: u64,
    /// Start of the current window
    pub window_started_at: SystemTime,
}

impl WindowEntry {
    /// A fresh window holding a single request
    pub fn start(now: SystemTime) -> Self {
        Self {
            count: 1,
            window_started_at: now,
        }
    }

    /// Time elapsed since the window opened
    ///
    /// A clock that moved backwards counts as zero elapsed time.
    pub fn elapsed(&self, now: SystemTime) -> Duration {
        now.duration_since(self.window_started_at)
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_expired(&self, window: Duration, now: SystemTime) -> bool {
        self.elapsed(now) >= window
    }

    pub fn resets_at(&self, window: Duration) -> SystemTime {
        self.window_started_at + window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_expiry_boundary() {
        let start = SystemTime::now();
        let entry = WindowEntry::start(start);
        let window = Duration::from_millis(1_000);

        assert!(!entry.is_expired(window, start));
        assert!(!entry.is_expired(window, start + Duration::from_millis(999)));
        assert!(entry.is_expired(window, start + window));
    }

    #[test]
    fn test_clock_going_backwards() {
        let start = SystemTime::now();
        let entry = WindowEntry::start(start);

        let earlier = start - Duration::from_secs(5);
        assert_eq!(entry.elapsed(earlier), Duration::ZERO);
        assert!(!entry.is_expired(Duration::from_secs(1), earlier));
    }
}
