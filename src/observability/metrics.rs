//! Client-side request metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding process installs a recorder.
//!
//! # Metrics
//! - `internal_api_requests_total` (counter): calls by method and outcome
//! - `internal_api_request_duration_seconds` (histogram): whole-call latency, retries included
//! - `internal_api_retries_total` (counter): extra attempts by reason

use std::time::Instant;

use metrics::{counter, histogram};

/// Record one finished call.
pub fn record_request(method: &str, outcome: &str, start_time: Instant) {
    let duration = start_time.elapsed().as_secs_f64();

    counter!(
        "internal_api_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        "internal_api_request_duration_seconds",
        "method" => method.to_string()
    )
    .record(duration);
}

/// Record one retry, labelled `status` or `transport`.
pub fn record_retry(reason: &'static str) {
    counter!("internal_api_retries_total", "reason" => reason).increment(1);
}
