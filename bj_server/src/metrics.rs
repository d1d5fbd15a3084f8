//! Prometheus metrics for monitoring the blackjack server.
//!
//! Metrics are exposed in Prometheus text format on a separate listener
//! (see `METRICS_BIND`).
//!
//! # Metrics Categories
//!
//! - **HTTP Metrics**: Request counts by route and status
//! - **WebSocket Metrics**: Active connections, messages in and out
//! - **Game Metrics**: Live rooms, commands accepted or rejected by kind
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use bj_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::websocket_connected();
//! metrics::command_processed("hit", true);
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
pub fn http_requests_total(route: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// WebSocket Metrics
// ============================================================================

/// Count a new WebSocket session.
pub fn websocket_connected() {
    metrics::counter!("websocket_connections_total").increment(1);
    metrics::gauge!("websocket_connections_active").increment(1.0);
}

/// Count a WebSocket session ending.
pub fn websocket_disconnected() {
    metrics::gauge!("websocket_connections_active").decrement(1.0);
}

/// Increment WebSocket messages sent counter.
pub fn websocket_messages_sent() {
    metrics::counter!("websocket_messages_sent").increment(1);
}

/// Increment WebSocket messages received counter.
pub fn websocket_messages_received() {
    metrics::counter!("websocket_messages_received").increment(1);
}

/// Increment rate limit hits counter.
pub fn rate_limit_hits_total() {
    metrics::counter!("rate_limit_hits_total").increment(1);
}

// ============================================================================
// Game Metrics
// ============================================================================

/// Set current live rooms count.
pub fn active_rooms(count: usize) {
    metrics::gauge!("active_rooms").set(count as f64);
}

/// Count a command a room accepted or rejected.
pub fn command_processed(kind: &str, accepted: bool) {
    metrics::counter!("commands_total",
        "kind" => kind.to_string(),
        "accepted" => accepted.to_string()
    )
    .increment(1);
}
