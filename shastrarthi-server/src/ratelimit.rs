//! HTTP helpers around rate limit decisions
//!
//! - [`build_rate_limit_headers`]: the `X-RateLimit-*` triple for a result
//! - [`client_ip`]: best-effort caller address for composing limiter keys
//!
//! `client_ip` trusts proxy headers as given. Anyone can send
//! `X-Forwarded-For`, so the address is only good for soft limits unless a
//! trusted proxy overwrites the header.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use shastrarthi::RateLimitResult;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";
const UNKNOWN_CLIENT: &str = "unknown";

/// Build the `X-RateLimit-Limit`, `X-RateLimit-Remaining` and
/// `X-RateLimit-Reset` headers for a rate limit result
pub fn build_rate_limit_headers(result: &RateLimitResult) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(3);
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(result.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(result.remaining));
    headers.insert(
        X_RATELIMIT_RESET,
        HeaderValue::from(result.reset_at_unix_seconds),
    );
    headers
}

/// Extract the caller's address from proxy headers
///
/// Returns the first non-empty entry of `X-Forwarded-For`, else `X-Real-IP`,
/// else `"unknown"`.
pub fn client_ip(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get(X_FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty());
    if let Some(first) = forwarded {
        return first.to_string();
    }

    let real_ip = headers
        .get(X_REAL_IP)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty());
    if let Some(real_ip) = real_ip {
        return real_ip.to_string();
    }

    UNKNOWN_CLIENT.to_string()
}

/// Limiter key for AI-backed endpoints
pub fn ai_rate_limit_key(user_id: &str, ip: &str) -> String {
    format!("ai:{user_id}:{ip}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_rate_limit_headers_round_trip() {
        let result = RateLimitResult {
            allowed: true,
            limit: 20,
            remaining: 13,
            retry_after_seconds: 0,
            reset_at_unix_seconds: 1_700_000_061,
        };

        let headers = build_rate_limit_headers(&result);
        let read = |name: &HeaderName| -> u64 {
            headers.get(name).unwrap().to_str().unwrap().parse().unwrap()
        };

        assert_eq!(headers.len(), 3);
        assert_eq!(read(&X_RATELIMIT_LIMIT), 20);
        assert_eq!(read(&X_RATELIMIT_REMAINING), 13);
        assert_eq!(read(&X_RATELIMIT_RESET), 1_700_000_061);
    }

    #[test]
    fn test_forwarded_for_first_entry() {
        let map = headers(&[
            ("x-forwarded-for", " 203.0.113.7 , 10.0.0.1"),
            ("x-real-ip", "10.0.0.2"),
        ]);
        assert_eq!(client_ip(&map), "203.0.113.7");
    }

    #[test]
    fn test_empty_forwarded_for_falls_back_to_real_ip() {
        let map = headers(&[("x-forwarded-for", " , 10.0.0.1"), ("x-real-ip", "10.0.0.2")]);
        assert_eq!(client_ip(&map), "10.0.0.2");
    }

    #[test]
    fn test_unknown_client() {
        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }

    #[test]
    fn test_ai_rate_limit_key() {
        assert_eq!(ai_rate_limit_key("u-1", "unknown"), "ai:u-1:unknown");
    }
}
