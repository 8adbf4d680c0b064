//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): inbound requests by status, cache outcome
//! - `proxy_request_duration_seconds` (histogram): inbound latency
//! - `proxy_cache_lookups_total` (counter): lookups by result (hit/miss)
//! - `proxy_cache_entries` (gauge): entries currently cached
//! - `proxy_cache_evictions_total` (counter): entries removed by the policy
//! - `proxy_upstream_fetches_total` (counter): fetches by outcome
//! - `proxy_upstream_fetch_duration_seconds` (histogram): fetch latency
//! - `proxy_inflight_joins_total` (counter): misses served by another request's fetch
//!
//! Recording is a no-op until `init_metrics` installs the Prometheus recorder.

use std::net::SocketAddr;
use std::sync::Once;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe_metrics();
            tracing::info!(address = %addr, "Metrics endpoint listening");
        }
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!("proxy_requests_total", Unit::Count, "Inbound proxy requests.");
        describe_histogram!(
            "proxy_request_duration_seconds",
            Unit::Seconds,
            "Inbound request latency."
        );
        describe_counter!("proxy_cache_lookups_total", Unit::Count, "Response cache lookups.");
        describe_gauge!("proxy_cache_entries", Unit::Count, "Responses currently cached.");
        describe_counter!(
            "proxy_cache_evictions_total",
            Unit::Count,
            "Cache entries removed by the eviction policy."
        );
        describe_counter!("proxy_upstream_fetches_total", Unit::Count, "Upstream fetches.");
        describe_histogram!(
            "proxy_upstream_fetch_duration_seconds",
            Unit::Seconds,
            "Upstream fetch latency."
        );
        describe_counter!(
            "proxy_inflight_joins_total",
            Unit::Count,
            "Cache misses that joined an already running fetch."
        );
    });
}

/// Record one completed inbound request.
pub fn record_request(status: u16, cache: &'static str, start: Instant) {
    counter!("proxy_requests_total", "status" => status.to_string(), "cache" => cache).increment(1);
    histogram!("proxy_request_duration_seconds", "cache" => cache)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("proxy_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_size(len: usize) {
    gauge!("proxy_cache_entries").set(len as f64);
}

pub fn record_cache_eviction() {
    counter!("proxy_cache_evictions_total").increment(1);
}

pub fn record_upstream_fetch(outcome: &'static str, start: Instant) {
    counter!("proxy_upstream_fetches_total", "outcome" => outcome).increment(1);
    histogram!("proxy_upstream_fetch_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_inflight_joined() {
    counter!("proxy_inflight_joins_total").increment(1);
}
