//! # Shastrarthi
//!
//! A fixed-window rate limiter for guarding expensive, AI-backed endpoints.
//!
//! ## Overview
//!
//! Every key owns a counter and the time its window opened. Requests inside
//! the window increment the counter until it reaches the ceiling; after that
//! requests are denied until the window elapses and a fresh one is opened.
//!
//! - **Fixed windows**: not sliding, not token-bucket. A caller can burst up to
//!   twice the ceiling across a window boundary.
//! - **Explicit clock**: every check takes `now`, so behavior is deterministic.
//! - **Bounded memory**: stores evict stale windows on their own schedule.
//!
//! ## Quick Start
//!
//! ```
//! use shastrarthi::{PeriodicStore, RateLimitOptions, RateLimiter};
//! use std::time::SystemTime;
//!
//! let mut limiter = RateLimiter::new(PeriodicStore::new());
//!
//! // 20 requests per 60 seconds
//! let options = RateLimitOptions::from_millis(60_000, 20);
//! let result = limiter
//!     .check("ai:user-42:203.0.113.7", &options, SystemTime::now())
//!     .unwrap();
//!
//! if result.allowed {
//!     println!("Request allowed! Remaining: {}", result.remaining);
//! } else {
//!     println!("Rate limited! Retry after: {} seconds", result.retry_after_seconds);
//! }
//! ```
//!
//! ## Store Types
//!
//! ### [`PeriodicStore`]
//! Sweeps stale windows at fixed intervals. Best for predictable workloads.
//!
//! ```
//! use shastrarthi::PeriodicStore;
//!
//! let store = PeriodicStore::builder()
//!     .capacity(500_000)
//!     .cleanup_interval(std::time::Duration::from_secs(60))
//!     .build();
//! ```
//!
//! ### [`ProbabilisticStore`]
//! Sweeps on a small fraction of writes. Best for high-throughput scenarios.
//!
//! ```
//! use shastrarthi::ProbabilisticStore;
//!
//! let store = ProbabilisticStore::builder()
//!     .capacity(2_000_000)
//!     .cleanup_probability(10_000) // 1 in 10,000 chance
//!     .build();
//! ```
//!
//! ## Thread Safety
//!
//! The rate limiter itself is not thread-safe. Either wrap it in a mutex or,
//! as the server does, give it to a single task and send checks over a channel:
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use shastrarthi::{PeriodicStore, RateLimiter};
//!
//! let limiter = Arc::new(Mutex::new(RateLimiter::new(PeriodicStore::new())));
//! ```
//!
//! ## Features
//!
//! - `ahash` (default): Use AHash for faster hashing

pub mod core;

pub use core::{
    LimitError, PeriodicStore, PeriodicStoreBuilder, ProbabilisticStore,
    ProbabilisticStoreBuilder, RateLimitOptions, RateLimitResult, RateLimiter, Store, WindowEntry,
};

pub use crate::core::store;
