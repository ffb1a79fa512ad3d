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
    /// The number of clients currently connected to the server.
    pub static ref CONNECTED_CLIENTS: Gauge =
        register_gauge!("smtplane_connected_clients", "Number of currently connected clients.").unwrap();
    /// The total number of connections accepted by the server since startup.
    pub static ref CONNECTIONS_RECEIVED_TOTAL: Counter =
        register_counter!("smtplane_connections_received_total", "Total number of connections received.").unwrap();
    /// Connections turned away because `max_clients` was reached.
    pub static ref CONNECTIONS_REJECTED_TOTAL: Counter =
        register_counter!("smtplane_connections_rejected_total", "Total number of connections refused at capacity.").unwrap();
    /// Commands dispatched to a handler, labeled by token.
    pub static ref COMMANDS_PROCESSED_TOTAL: CounterVec =
        register_counter_vec!("smtplane_commands_processed_total", "Total number of commands dispatched, labeled by token.", &["command"]).unwrap();
    /// Lines rejected before dispatch, labeled by reason.
    pub static ref LINES_REJECTED_TOTAL: CounterVec =
        register_counter_vec!("smtplane_lines_rejected_total", "Total number of lines rejected before dispatch, labeled by reason.", &["reason"]).unwrap();
    /// STARTTLS attempts, labeled by outcome.
    pub static ref STARTTLS_TOTAL: CounterVec =
        register_counter_vec!("smtplane_starttls_total", "Total number of STARTTLS attempts, labeled by outcome.", &["outcome"]).unwrap();
    /// Messages handed to the manager.
    pub static ref MESSAGES_DELIVERED_TOTAL: Counter =
        register_counter!("smtplane_messages_delivered_total", "Total number of messages accepted for delivery.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}
