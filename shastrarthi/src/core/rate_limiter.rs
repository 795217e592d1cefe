//! Fixed-window rate limiter implementation
//!
//! This module provides the main [`RateLimiter`] struct. Each key owns one
//! counter that is reset when its window elapses. Windows are fixed, not
//! sliding: a caller can spend `max_requests` at the very end of one window
//! and `max_requests` again right after the next one opens.

use super::{LimitError, RateLimitOptions, WindowEntry, store::Store};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Result of a rate limit check
///
/// Contains the decision plus everything needed to build rate limit headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether the request may proceed
    pub allowed: bool,
    /// The configured ceiling for the window
    pub limit: u64,
    /// Requests left in the current window after this one
    pub remaining: u64,
    /// Seconds until the window resets (0 when allowed, at least 1 when denied)
    pub retry_after_seconds: u64,
    /// Unix time in seconds at which the current window resets
    pub reset_at_unix_seconds: u64,
}

/// Fixed-window rate limiter
///
/// Requires a [`Store`] implementation to hold per-key window entries.
///
/// # Example
///
/// ```
/// use shastrarthi::{PeriodicStore, RateLimitOptions, RateLimiter};
/// use std::time::SystemTime;
///
/// let mut limiter = RateLimiter::new(PeriodicStore::new());
/// let options = RateLimitOptions::from_millis(60_000, 20);
///
/// let result = limiter
///     .check("ai:user-1:10.0.0.1", &options, SystemTime::now())
///     .unwrap();
/// assert!(result.allowed);
/// assert_eq!(result.remaining, 19);
/// ```
pub struct RateLimiter<S: Store> {
    store: S,
}

impl<S: Store> RateLimiter<S> {
    /// Create a new rate limiter with the specified store
    pub fn new(store: S) -> Self {
        RateLimiter { store }
    }

    /// Number of keys currently held by the store
    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }

    /// Count a request for `key` and decide whether it is allowed
    ///
    /// # Parameters
    ///
    /// - `key`: Caller identity for the limited purpose (e.g. `"ai:{user}:{ip}"`)
    /// - `options`: Window length and request ceiling
    /// - `now`: Current time for the check
    ///
    /// # Behavior
    ///
    /// 1. No live entry (missing or window elapsed): start a new window with a
    ///    count of 1 and allow.
    /// 2. Live entry under the ceiling: increment and allow.
    /// 3. Live entry at the ceiling: deny without touching the stored entry.
    ///
    /// # Errors
    ///
    /// - [`LimitError::InvalidWindow`]: If the window is zero
    /// - [`LimitError::InvalidLimit`]: If `max_requests` is zero
    /// - [`LimitError::Internal`]: If the store fails or `now` predates the Unix epoch
    pub fn check(
        &mut self,
        key: &str,
        options: &RateLimitOptions,
        now: SystemTime,
    ) -> Result<RateLimitResult, LimitError> {
        if options.window.is_zero() {
            return Err(LimitError::InvalidWindow);
        }
        if options.max_requests == 0 {
            return Err(LimitError::InvalidLimit);
        }

        let limit = options.max_requests;
        let existing = self.store.get(key, now).map_err(LimitError::Internal)?;

        let live = existing.filter(|entry| !entry.is_expired(options.window, now));
        let Some(entry) = live else {
            let entry = WindowEntry::start(now);
            self.store
                .set_with_ttl(key, entry, options.window, now)
                .map_err(LimitError::Internal)?;

            return Ok(RateLimitResult {
                allowed: true,
                limit,
                remaining: limit - 1,
                retry_after_seconds: 0,
                reset_at_unix_seconds: unix_seconds_ceil(entry.resets_at(options.window))?,
            });
        };

        let resets_at = entry.resets_at(options.window);
        let reset_at_unix_seconds = unix_seconds_ceil(resets_at)?;
        let until_reset = resets_at.duration_since(now).unwrap_or(Duration::ZERO);

        if entry.count >= limit {
            return Ok(RateLimitResult {
                allowed: false,
                limit,
                remaining: 0,
                retry_after_seconds: seconds_ceil(until_reset).max(1),
                reset_at_unix_seconds,
            });
        }

        let updated = WindowEntry {
            count: entry.count + 1,
            ..entry
        };
        self.store
            .set_with_ttl(key, updated, until_reset, now)
            .map_err(LimitError::Internal)?;

        Ok(RateLimitResult {
            allowed: true,
            limit,
            remaining: limit.saturating_sub(updated.count),
            retry_after_seconds: 0,
            reset_at_unix_seconds,
        })
    }
}

fn seconds_ceil(duration: Duration) -> u64 {
    if duration.subsec_nanos() > 0 {
        duration.as_secs() + 1
    } else {
        duration.as_secs()
    }
}

fn unix_seconds_ceil(time: SystemTime) -> Result<u64, LimitError> {
    time.duration_since(UNIX_EPOCH)
        .map(seconds_ceil)
        .map_err(|e| LimitError::Internal(format!("System time error: {e}")))
}
