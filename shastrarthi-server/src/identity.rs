//! Caller authentication
//!
//! The synthesis endpoint needs a user id for its rate limit key. An
//! [`IdentityProvider`] turns request headers into a [`User`]; the production
//! implementation asks Supabase Auth who owns the bearer token.

use crate::config::IdentityConfig;
use anyhow::Result;
use async_trait::async_trait;
use axum::http::{HeaderMap, header::AUTHORIZATION};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// An authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Identity lookup failed: {0}")]
    Upstream(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<User, AuthError>;
}

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Supabase Auth `GET /auth/v1/user`
pub struct SupabaseIdentity {
    http_client: Client,
    user_url: Option<String>,
    anon_key: Option<String>,
}

impl SupabaseIdentity {
    pub fn new(config: &IdentityConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        if config.supabase_url.is_none() {
            tracing::warn!("No Supabase URL configured; all synthesis requests will be unauthorized");
        }

        Ok(Self {
            http_client,
            user_url: config
                .supabase_url
                .as_deref()
                .map(|url| format!("{}/auth/v1/user", url.trim_end_matches('/'))),
            anon_key: config.supabase_anon_key.clone(),
        })
    }
}

#[async_trait]
impl IdentityProvider for SupabaseIdentity {
    async fn authenticate(&self, headers: &HeaderMap) -> Result<User, AuthError> {
        let Some(user_url) = self.user_url.as_deref() else {
            return Err(AuthError::Unauthorized);
        };
        let token = bearer_token(headers).ok_or(AuthError::Unauthorized)?;

        let mut request = self.http_client.get(user_url).bearer_auth(token);
        if let Some(anon_key) = &self.anon_key {
            request = request.header("apikey", anon_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::Upstream(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(AuthError::Upstream(format!("Supabase returned {status}")));
        }
        if !status.is_success() {
            tracing::debug!("Token rejected by Supabase: {}", status);
            return Err(AuthError::Unauthorized);
        }

        response
            .json::<User>()
            .await
            .map_err(|e| AuthError::Upstream(format!("Invalid Supabase user payload: {e}")))
    }
}
