//! Simple metrics collection for observability
//!
//! Atomic counters updated on the request path and rendered in Prometheus
//! text format by `GET /metrics`. Latency is measured up to the point the
//! response head is ready, so streamed bodies do not skew it.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// How a synthesis request was answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Stream opened
    Streamed,
    /// 401
    Unauthorized,
    /// 400
    Invalid,
    /// 429
    RateLimited,
    /// 503
    Unconfigured,
    /// 500 before the stream opened
    Failed,
}

/// Core metrics collected by the server
pub struct Metrics {
    start_time: Instant,

    pub synthesis_requests: AtomicU64,

    /// Responses by outcome
    pub streamed: AtomicU64,
    pub unauthorized: AtomicU64,
    pub rejected_invalid: AtomicU64,
    pub rate_limited: AtomicU64,
    pub provider_unconfigured: AtomicU64,
    pub internal_errors: AtomicU64,

    /// Stream lifecycle
    pub active_streams: AtomicUsize,
    pub streams_completed: AtomicU64,
    pub streams_failed: AtomicU64,
    pub chunks_sent: AtomicU64,

    /// Time to response head (in microseconds)
    pub latency_under_1ms: AtomicU64,
    pub latency_under_10ms: AtomicU64,
    pub latency_under_100ms: AtomicU64,
    pub latency_under_1s: AtomicU64,
    pub latency_over_1s: AtomicU64,
    pub latency_sum_micros: AtomicU64,
    pub latency_count: AtomicU64,

    /// Keys held by the limiter store at the last scrape
    pub tracked_keys: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            synthesis_requests: AtomicU64::new(0),
            streamed: AtomicU64::new(0),
            unauthorized: AtomicU64::new(0),
            rejected_invalid: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            provider_unconfigured: AtomicU64::new(0),
            internal_errors: AtomicU64::new(0),
            active_streams: AtomicUsize::new(0),
            streams_completed: AtomicU64::new(0),
            streams_failed: AtomicU64::new(0),
            chunks_sent: AtomicU64::new(0),
            latency_under_1ms: AtomicU64::new(0),
            latency_under_10ms: AtomicU64::new(0),
            latency_under_100ms: AtomicU64::new(0),
            latency_under_1s: AtomicU64::new(0),
            latency_over_1s: AtomicU64::new(0),
            latency_sum_micros: AtomicU64::new(0),
            latency_count: AtomicU64::new(0),
            tracked_keys: AtomicUsize::new(0),
        }
    }

    /// Record how a request was answered and how long that took
    pub fn record_request(&self, outcome: Outcome, latency_us: u64) {
        self.synthesis_requests.fetch_add(1, Ordering::Relaxed);

        let counter = match outcome {
            Outcome::Streamed => &self.streamed,
            Outcome::Unauthorized => &self.unauthorized,
            Outcome::Invalid => &self.rejected_invalid,
            Outcome::RateLimited => &self.rate_limited,
            Outcome::Unconfigured => &self.provider_unconfigured,
            Outcome::Failed => &self.internal_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let bucket = match latency_us {
            0..=999 => &self.latency_under_1ms,
            1000..=9999 => &self.latency_under_10ms,
            10000..=99999 => &self.latency_under_100ms,
            100000..=999999 => &self.latency_under_1s,
            _ => &self.latency_over_1s,
        };
        bucket.fetch_add(1, Ordering::Relaxed);

        self.latency_sum_micros
            .fetch_add(latency_us, Ordering::Relaxed);
        self.latency_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stream_opened(&self) {
        self.active_streams.fetch_add(1, Ordering::Relaxed);
    }

    /// Close out a stream; `completed` is false after an error frame or a disconnect
    pub fn stream_finished(&self, completed: bool) {
        self.active_streams.fetch_sub(1, Ordering::Relaxed);
        if completed {
            self.streams_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.streams_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_chunk(&self) {
        self.chunks_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_tracked_keys(&self, count: usize) {
        self.tracked_keys.store(count, Ordering::Relaxed);
    }

    /// Requests the limiter let through
    pub fn rate_limit_allowed(&self) -> u64 {
        self.streamed.load(Ordering::Relaxed) + self.provider_unconfigured.load(Ordering::Relaxed)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let mut out = String::with_capacity(2048);
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);

        gauge(
            &mut out,
            "uptime_seconds",
            "Time since server start in seconds",
            self.uptime_seconds(),
        );
        counter(
            &mut out,
            "synthesis_requests_total",
            "Total synthesis requests received",
            load(&self.synthesis_requests),
        );

        header(
            &mut out,
            "synthesis_responses_total",
            "Synthesis responses by outcome",
            "counter",
        );
        for (label, value) in [
            ("streamed", load(&self.streamed)),
            ("unauthorized", load(&self.unauthorized)),
            ("invalid", load(&self.rejected_invalid)),
            ("rate_limited", load(&self.rate_limited)),
            ("unconfigured", load(&self.provider_unconfigured)),
            ("error", load(&self.internal_errors)),
        ] {
            let _ = writeln!(
                out,
                "shastrarthi_synthesis_responses_total{{outcome=\"{label}\"}} {value}"
            );
        }
        out.push('\n');

        header(
            &mut out,
            "rate_limit_decisions_total",
            "Rate limiter decisions",
            "counter",
        );
        let _ = writeln!(
            out,
            "shastrarthi_rate_limit_decisions_total{{decision=\"allowed\"}} {}",
            self.rate_limit_allowed()
        );
        let _ = writeln!(
            out,
            "shastrarthi_rate_limit_decisions_total{{decision=\"denied\"}} {}\n",
            load(&self.rate_limited)
        );

        gauge(
            &mut out,
            "streams_active",
            "Synthesis streams currently open",
            self.active_streams.load(Ordering::Relaxed) as u64,
        );
        counter(
            &mut out,
            "streams_completed_total",
            "Streams that ended with [DONE]",
            load(&self.streams_completed),
        );
        counter(
            &mut out,
            "streams_failed_total",
            "Streams that ended with an error frame or a disconnect",
            load(&self.streams_failed),
        );
        counter(
            &mut out,
            "stream_chunks_total",
            "Content frames written",
            load(&self.chunks_sent),
        );

        // Cumulative buckets
        header(
            &mut out,
            "request_duration_seconds",
            "Time until the response head was ready",
            "histogram",
        );
        let mut cumulative = 0;
        for (le, bucket) in [
            ("0.001", &self.latency_under_1ms),
            ("0.01", &self.latency_under_10ms),
            ("0.1", &self.latency_under_100ms),
            ("1", &self.latency_under_1s),
            ("+Inf", &self.latency_over_1s),
        ] {
            cumulative += load(bucket);
            let _ = writeln!(
                out,
                "shastrarthi_request_duration_seconds_bucket{{le=\"{le}\"}} {cumulative}"
            );
        }
        let latency_sum_seconds = load(&self.latency_sum_micros) as f64 / 1_000_000.0;
        let _ = writeln!(
            out,
            "shastrarthi_request_duration_seconds_sum {latency_sum_seconds:.6}"
        );
        let _ = writeln!(
            out,
            "shastrarthi_request_duration_seconds_count {}\n",
            load(&self.latency_count)
        );

        gauge(
            &mut out,
            "tracked_keys",
            "Rate limit keys held by the store",
            self.tracked_keys.load(Ordering::Relaxed) as u64,
        );

        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP shastrarthi_{name} {help}");
    let _ = writeln!(out, "# TYPE shastrarthi_{name} {kind}");
}

fn counter(out: &mut String, name: &str, help: &str, value: u64) {
    header(out, name, help, "counter");
    let _ = writeln!(out, "shastrarthi_{name} {value}\n");
}

fn gauge(out: &mut String, name: &str, help: &str, value: u64) {
    header(out, name, help, "gauge");
    let _ = writeln!(out, "shastrarthi_{name} {value}\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_request() {
        let metrics = Metrics::new();

        metrics.record_request(Outcome::Streamed, 500);
        metrics.record_request(Outcome::RateLimited, 50_000);
        metrics.record_request(Outcome::Unconfigured, 800);

        assert_eq!(metrics.synthesis_requests.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.streamed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.rate_limited.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.rate_limit_allowed(), 2);
        assert_eq!(metrics.latency_under_1ms.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.latency_under_100ms.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_stream_lifecycle() {
        let metrics = Metrics::new();

        metrics.stream_opened();
        metrics.stream_opened();
        assert_eq!(metrics.active_streams.load(Ordering::Relaxed), 2);

        metrics.record_chunk();
        metrics.stream_finished(true);
        metrics.stream_finished(false);

        assert_eq!(metrics.active_streams.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.streams_completed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.streams_failed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.chunks_sent.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_latency_buckets_are_cumulative() {
        let metrics = Metrics::new();

        for latency in [500, 5_000, 50_000, 500_000, 5_000_000] {
            metrics.record_request(Outcome::Streamed, latency);
        }

        let output = metrics.export_prometheus();
        assert!(output.contains("shastrarthi_request_duration_seconds_bucket{le=\"0.001\"} 1\n"));
        assert!(output.contains("shastrarthi_request_duration_seconds_bucket{le=\"0.1\"} 3\n"));
        assert!(output.contains("shastrarthi_request_duration_seconds_bucket{le=\"+Inf\"} 5\n"));
        assert!(output.contains("shastrarthi_request_duration_seconds_count 5\n"));
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = Metrics::new();
        metrics.record_request(Outcome::Invalid, 10);
        metrics.update_tracked_keys(7);

        let output = metrics.export_prometheus();
        assert!(output.contains("# TYPE shastrarthi_synthesis_requests_total counter"));
        assert!(output.contains("shastrarthi_synthesis_requests_total 1\n"));
        assert!(output.contains("shastrarthi_synthesis_responses_total{outcome=\"invalid\"} 1"));
        assert!(output.contains("shastrarthi_rate_limit_decisions_total{decision=\"allowed\"} 0"));
        assert!(output.contains("shastrarthi_tracked_keys 7\n"));
    }
}
