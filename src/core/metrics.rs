// src/core/metrics.rs

//! Defines and registers Prometheus metrics for server monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, TextEncoder, register_counter, register_counter_vec,
    register_gauge,
};

lazy_static! {
    // --- Server-wide Gauges ---
    /// The number of clients currently connected to the server.
    pub static ref CONNECTED_CLIENTS: Gauge =
        register_gauge!("telconsole_connected_clients", "Number of currently connected clients.").unwrap();

    // --- Server-wide Counters ---
    /// The total number of connections accepted by the server since startup.
    pub static ref CONNECTIONS_RECEIVED_TOTAL: Counter =
        register_counter!("telconsole_connections_received_total", "Total number of connections received.").unwrap();
    /// The total number of failed `accept` calls on the listener.
    pub static ref ACCEPT_ERRORS_TOTAL: Counter =
        register_counter!("telconsole_accept_errors_total", "Total number of failed connection accepts.").unwrap();
    /// The total number of completed lines handed to evaluators.
    pub static ref LINES_DISPATCHED_TOTAL: Counter =
        register_counter!("telconsole_lines_dispatched_total", "Total number of lines dispatched to evaluators.").unwrap();

    // --- Labeled Counters ---
    /// Telnet control sequences stripped from client input, labeled by command.
    pub static ref CONTROL_SEQUENCES_TOTAL: CounterVec =
        register_counter_vec!("telconsole_control_sequences_total", "Total number of telnet control sequences stripped, labeled by command.", &["command"]).unwrap();
    /// Sessions torn down, labeled by the reason.
    pub static ref SESSIONS_CLOSED_TOTAL: CounterVec =
        register_counter_vec!("telconsole_sessions_closed_total", "Total number of sessions closed, labeled by reason.", &["reason"]).unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}
