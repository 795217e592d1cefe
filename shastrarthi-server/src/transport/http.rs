//! HTTP transport
//!
//! # API Endpoints
//!
//! ## POST /api/synthesize
//!
//! Generate a cross-text synthesis for an authenticated caller and stream it
//! back as server-sent events.
//!
//! ### Request
//!
//! `Authorization: Bearer <token>` plus a JSON body:
//!
//! ```json
//! {
//!   "query": "Compare karma in the Gita and the Upanishads",
//!   "texts": [{ "title_en": "Bhagavad Gita", "description": "..." }]
//! }
//! ```
//!
//! ### Responses
//!
//! | Status | Body                                      |
//! |--------|-------------------------------------------|
//! | 200    | `text/event-stream`, see [`crate::types`] |
//! | 400    | invalid body, missing or oversized query  |
//! | 401    | no authenticated caller                   |
//! | 429    | rate limited, with `Retry-After`          |
//! | 503    | no provider credentials                   |
//! | 500    | limiter or identity lookup failed         |
//!
//! Every non-200 body is `{"error": "..."}`. 200 and 429 responses carry
//! `X-RateLimit-Limit`, `X-RateLimit-Remaining` and `X-RateLimit-Reset`.
//!
//! ## GET /health
//!
//! Returns "OK" with 200 status.
//!
//! ## GET /metrics
//!
//! Prometheus text exposition.

use super::Transport;
use crate::actor::RateLimiterHandle;
use crate::config::SynthesisConfig;
use crate::identity::{AuthError, IdentityProvider};
use crate::metrics::{Metrics, Outcome};
use crate::provider::CompletionProvider;
use crate::ratelimit::{ai_rate_limit_key, build_rate_limit_headers, client_ip};
use crate::synthesis::{StreamFrame, SynthesisRequest, synthesis_stream};
use crate::types::{HttpErrorResponse, STREAM_DONE, SynthesizeBody};
use anyhow::Result;
use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE, RETRY_AFTER};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::{Router, extract::State};
use futures::StreamExt;
use shastrarthi::RateLimitOptions;
use std::sync::Arc;
use std::time::{Duration, Instant};

const UNAUTHORIZED: &str = "Unauthorized";
const INVALID_BODY: &str = "Invalid JSON body";
const RATE_LIMITED: &str = "Rate limit exceeded. Please try again shortly.";
const NOT_CONFIGURED: &str = "AI service is not configured.";
const INTERNAL_ERROR: &str = "Internal server error";

/// Shared state of the HTTP handlers
pub struct AppState {
    pub limiter: RateLimiterHandle,
    pub provider: Arc<dyn CompletionProvider>,
    pub identity: Arc<dyn IdentityProvider>,
    pub metrics: Arc<Metrics>,
    pub rate_limit: RateLimitOptions,
    pub chunk_delay: Duration,
}

impl AppState {
    pub fn new(
        config: &SynthesisConfig,
        limiter: RateLimiterHandle,
        provider: Arc<dyn CompletionProvider>,
        identity: Arc<dyn IdentityProvider>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            limiter,
            provider,
            identity,
            metrics,
            rate_limit: RateLimitOptions::from_millis(
                config.rate_window_ms,
                config.rate_max_requests,
            ),
            chunk_delay: Duration::from_millis(config.chunk_delay_ms),
        }
    }
}

/// HTTP transport implementation
pub struct HttpTransport {
    host: String,
    port: u16,
}

impl HttpTransport {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn start(self, state: Arc<AppState>) -> Result<()> {
        let listener = tokio::net::TcpListener::bind((self.host.as_str(), self.port)).await?;
        tracing::info!("HTTP server listening on {}", listener.local_addr()?);

        axum::serve(listener, router(state)).await?;

        Ok(())
    }
}

/// Routes served by the transport
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/synthesize", post(handle_synthesize))
        .route("/health", get(|| async { "OK" }))
        .route("/metrics", get(handle_metrics))
        .with_state(state)
}

async fn handle_synthesize(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start = Instant::now();
    let (outcome, response) = synthesize(&state, &headers, &body).await;
    state
        .metrics
        .record_request(outcome, start.elapsed().as_micros() as u64);
    response
}

async fn synthesize(state: &AppState, headers: &HeaderMap, body: &[u8]) -> (Outcome, Response) {
    let user = match state.identity.authenticate(headers).await {
        Ok(user) => user,
        Err(AuthError::Unauthorized) => {
            return (
                Outcome::Unauthorized,
                error_response(StatusCode::UNAUTHORIZED, UNAUTHORIZED),
            );
        }
        Err(e) => {
            tracing::error!("Authentication failed: {}", e);
            return (
                Outcome::Failed,
                error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR),
            );
        }
    };

    let body: SynthesizeBody = match serde_json::from_slice(body) {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!("Rejected synthesis body: {}", e);
            return (
                Outcome::Invalid,
                error_response(StatusCode::BAD_REQUEST, INVALID_BODY),
            );
        }
    };

    let request = match SynthesisRequest::from_body(body) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!("Rejected synthesis request: {}", e);
            return (
                Outcome::Invalid,
                error_response(StatusCode::BAD_REQUEST, e.to_string()),
            );
        }
    };

    let key = ai_rate_limit_key(&user.id, &client_ip(headers));
    let decision = match state.limiter.check(key, state.rate_limit).await {
        Ok(decision) => decision,
        Err(e) => {
            tracing::error!("Rate limiter error: {}", e);
            return (
                Outcome::Failed,
                error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR),
            );
        }
    };
    let rate_headers = build_rate_limit_headers(&decision);

    if !decision.allowed {
        tracing::info!(
            "Rate limited user {} for {}s",
            user.id,
            decision.retry_after_seconds
        );
        let mut response = error_response(StatusCode::TOO_MANY_REQUESTS, RATE_LIMITED);
        response.headers_mut().extend(rate_headers);
        response.headers_mut().insert(
            RETRY_AFTER,
            HeaderValue::from(decision.retry_after_seconds),
        );
        return (Outcome::RateLimited, response);
    }

    // The slot is spent even when the provider turns out to be unavailable
    if !state.provider.is_configured() {
        tracing::warn!("Synthesis requested but no provider credentials are configured");
        return (
            Outcome::Unconfigured,
            error_response(StatusCode::SERVICE_UNAVAILABLE, NOT_CONFIGURED),
        );
    }

    let events = synthesis_stream(
        state.provider.clone(),
        request,
        state.chunk_delay,
        state.metrics.clone(),
    )
    .map(into_sse_event);

    let mut response = Sse::new(events).into_response();
    let response_headers = response.headers_mut();
    response_headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    response_headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-transform"),
    );
    response_headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    response_headers.extend(rate_headers);

    (Outcome::Streamed, response)
}

fn into_sse_event(frame: StreamFrame) -> Result<Event, axum::Error> {
    match frame {
        StreamFrame::Event(event) => Event::default().json_data(event),
        StreamFrame::Done => Ok(Event::default().data(STREAM_DONE)),
    }
}

async fn handle_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.limiter.tracked_keys().await {
        Ok(count) => state.metrics.update_tracked_keys(count),
        Err(e) => tracing::warn!("Could not read tracked key count: {}", e),
    }

    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.export_prometheus(),
    )
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(HttpErrorResponse::new(message))).into_response()
}
