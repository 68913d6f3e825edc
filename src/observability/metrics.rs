//! Metrics collection and exposition.
//!
//! # Metrics
//! - `converge_runs_total` (counter): convergences by outcome
//! - `converge_duration_seconds` (histogram): wall time of one convergence
//! - `haproxy_reloads_total` (counter): reload attempts by result
//! - `haproxy_socket_commands_total` (counter): enable/disable commands sent
//! - `haproxy_live_backends` (gauge): servers seen in the last `show stat`

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter on `addr`. Must run inside the runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_converge(outcome: &'static str, start: Instant) {
    ::metrics::counter!("converge_runs_total", "outcome" => outcome).increment(1);
    ::metrics::histogram!("converge_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_reload(success: bool) {
    let result = if success { "success" } else { "failure" };
    ::metrics::counter!("haproxy_reloads_total", "result" => result).increment(1);
}

pub fn record_socket_command(action: &'static str) {
    ::metrics::counter!("haproxy_socket_commands_total", "action" => action).increment(1);
}

pub fn record_live_backends(count: usize) {
    ::metrics::gauge!("haproxy_live_backends").set(count as f64);
}
