//! Metrics collection and exposition.
//!
//! # Metrics
//! - `cachr_cache_lookups_total` (counter): lookups by `result` (hit, miss)
//! - `cachr_cache_inserts_total` (counter): responses stored
//! - `cachr_cache_entries` (gauge): entries currently held
//! - `cachr_connections_total` (counter): finished connections by `outcome`
//! - `cachr_upstream_duration_seconds` (histogram): forward + response time
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!("cachr_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_insert() {
    metrics::counter!("cachr_cache_inserts_total").increment(1);
}

pub fn record_cache_size(entries: usize) {
    metrics::gauge!("cachr_cache_entries").set(entries as f64);
}

pub fn record_connection(outcome: &'static str) {
    metrics::counter!("cachr_connections_total", "outcome" => outcome).increment(1);
}

pub fn record_upstream_duration(start: Instant) {
    metrics::histogram!("cachr_upstream_duration_seconds").record(start.elapsed().as_secs_f64());
}
