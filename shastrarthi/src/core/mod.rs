//! Core components of the shastrarthi rate limiting library
//!
//! This module contains the fundamental building blocks:
//! - [`window`]: Window options and the per-key counter entry
//! - [`rate_limiter`]: The fixed-window rate limiter
//! - [`store`]: Storage backends for rate limit state

pub mod rate_limiter;
pub mod store;
pub mod window;
#[cfg(test)]
mod tests;

pub use rate_limiter::{RateLimitResult, RateLimiter};
pub use store::{
    PeriodicStore, PeriodicStoreBuilder, ProbabilisticStore, ProbabilisticStoreBuilder, Store,
};
pub use window::{RateLimitOptions, WindowEntry};

use std::error::Error;
use std::fmt;

/// Errors that can occur during rate limiting operations
///
/// # Variants
///
/// - [`InvalidWindow`](LimitError::InvalidWindow): The window length was zero
/// - [`InvalidLimit`](LimitError::InvalidLimit): The request ceiling was zero
/// - [`Internal`](LimitError::Internal): The store failed or the clock is unusable
///
/// # Example
///
/// ```
/// use shastrarthi::{LimitError, PeriodicStore, RateLimitOptions, RateLimiter};
/// use std::time::{Duration, SystemTime};
///
/// let mut limiter = RateLimiter::new(PeriodicStore::new());
/// let options = RateLimitOptions::new(Duration::ZERO, 20);
///
/// match limiter.check("key", &options, SystemTime::now()) {
///     Err(LimitError::InvalidWindow) => println!("window must be positive"),
///     _ => {}
/// }
/// ```
#[derive(Debug)]
pub enum LimitError {
    /// The window length was zero
    InvalidWindow,
    /// The maximum number of requests per window was zero
    InvalidLimit,
    /// An internal error occurred
    Internal(String),
}

impl fmt::Display for LimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitError::InvalidWindow => write!(f, "rate limit window must be positive"),
            LimitError::InvalidLimit => write!(f, "rate limit ceiling must be at least 1"),
            LimitError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl Error for LimitError {}
