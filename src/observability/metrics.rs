//! Metrics collection and exposition.
//!
//! # Metrics
//! - `tunnel_dials_total` (counter): dial attempts by outcome
//! - `tunnel_active_connections` (gauge): current tunnel connection count
//! - `tunnel_exchanges_total` (counter): exchanges by kind and status
//! - `tunnel_backend_request_duration_seconds` (histogram): backend latency
//! - `tunnel_sessions_ended_total` (counter): session terminations by reason
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_dial(ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    metrics::counter!("tunnel_dials_total", "outcome" => outcome).increment(1);
}

pub fn set_active_connections(count: usize) {
    metrics::gauge!("tunnel_active_connections").set(count as f64);
}

pub fn record_exchange(kind: &'static str, status: u16) {
    metrics::counter!(
        "tunnel_exchanges_total",
        "kind" => kind,
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_backend_latency(start: Instant) {
    metrics::histogram!("tunnel_backend_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_session_end(reason: &'static str) {
    metrics::counter!("tunnel_sessions_ended_total", "reason" => reason).increment(1);
}
