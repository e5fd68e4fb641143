//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define terminator metrics (handshakes, closures, live connections)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `tls_handshakes_total` (counter): setup attempts by outcome
//!   (`success`, or the failing step such as `handshake`, `bind`, `accept`)
//! - `tls_connections_closed_total` (counter): closed sockets by closure
//!   (`clean`, `forced`, `aborted`)
//! - `tls_active_connections` (gauge): occupied connection slots
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::net::connection::Closure;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_handshake(outcome: &'static str) {
    metrics::counter!("tls_handshakes_total", "outcome" => outcome).increment(1);
}

pub fn record_closed(closure: Closure) {
    metrics::counter!("tls_connections_closed_total", "closure" => closure.as_str()).increment(1);
}

pub fn set_active_connections(count: usize) {
    metrics::gauge!("tls_active_connections").set(count as f64);
}
