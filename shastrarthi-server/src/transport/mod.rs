//! Transport layer for the synthesis server
//!
//! Transports implement the [`Transport`] trait and share one
//! [`http::AppState`]: the rate limiter actor handle plus the provider,
//! identity and metrics collaborators.
//!
//! # Available Transports
//!
//! - [`http`]: JSON requests in, server-sent events out

pub mod http;


use anyhow::Result;
use async_trait::async_trait;
use self::http::AppState;
use std::sync::Arc;

/// Common interface for all transport implementations
#[async_trait]
pub trait Transport {
    /// Bind, then serve requests until an error occurs or the server shuts down
    async fn start(self, state: Arc<AppState>) -> Result<()>;
}
