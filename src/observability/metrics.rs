//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Expose a Prometheus-compatible endpoint on its own listen address
//! - Track request volume, failure class, and round-trip latency
//! - Track SSH handshakes, session evictions, and credential reloads
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method and status
//! - `proxy_request_duration_seconds` (histogram): end-to-end latency
//! - `proxy_upstream_round_trip_seconds` (histogram): transport exchange time
//! - `ssh_handshakes_total` (counter): handshake attempts by outcome
//! - `ssh_sessions_evicted_total` (counter): pool evictions
//! - `credential_reloads_total` (counter): reloads by outcome
//!
//! # Design Decisions
//! - Metric updates are cheap enough for the request path (atomics under the
//!   `metrics` facade); exposition runs on a separate listener so scraping
//!   never contends with proxying.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
///
/// The metrics endpoint is optional; callers skip this entirely when no
/// address is configured.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe_metrics();
            tracing::info!(address = %addr, "metrics endpoint listening");
        }
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "failed to install metrics exporter");
        }
    }
}

fn describe_metrics() {
    describe_counter!(
        "proxy_requests_total",
        "Proxied requests by method and response status"
    );
    describe_histogram!(
        "proxy_request_duration_seconds",
        "End-to-end request latency"
    );
    describe_histogram!(
        "proxy_upstream_round_trip_seconds",
        "Upstream exchange latency over the secure transport"
    );
    describe_counter!(
        "proxy_transport_failures_total",
        "Failed round trips by transport failure class"
    );
    describe_counter!("ssh_handshakes_total", "SSH handshake attempts by outcome");
    describe_counter!(
        "ssh_sessions_evicted_total",
        "Sessions evicted from the pool"
    );
    describe_counter!(
        "credential_reloads_total",
        "Credential reload attempts by outcome"
    );
}

/// Record one proxied request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "proxy_request_duration_seconds",
        "method" => method.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record the upstream exchange time of one round trip.
pub fn record_round_trip(destination: &str, elapsed: Duration) {
    histogram!(
        "proxy_upstream_round_trip_seconds",
        "destination" => destination.to_string()
    )
    .record(elapsed.as_secs_f64());
}

/// Record a failed round trip by failure class.
pub fn record_transport_failure(class: &'static str) {
    counter!("proxy_transport_failures_total", "class" => class).increment(1);
}

/// Record an SSH handshake attempt; `outcome` is "ok" or an error class.
pub fn record_handshake(outcome: &str) {
    counter!("ssh_handshakes_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record a session eviction from the pool.
pub fn record_session_eviction() {
    counter!("ssh_sessions_evicted_total").increment(1);
}

/// Record a credential reload attempt.
pub fn record_reload(outcome: &str) {
    counter!("credential_reloads_total", "outcome" => outcome.to_string()).increment(1);
}
