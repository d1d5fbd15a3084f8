//! Structured logging configuration.
//!
//! The engine logs through the `log` facade; the subscriber installed here
//! picks those records up alongside the server's own `tracing` events.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Log levels come from `RUST_LOG` and default to `info` with noisy
/// dependencies turned down.
///
/// # Example
///
/// ```no_run
/// use bj_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn,tower_http=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log a WebSocket session starting or ending
///
/// # Arguments
///
/// * `event` - `"connected"` or `"disconnected"`
/// * `room_id` - Room the socket is attached to
/// * `player_id` - Player behind the socket
pub fn log_session_event(event: &str, room_id: &str, player_id: &str) {
    tracing::info!(
        session_event = event,
        room_id = room_id,
        player_id = player_id,
        "WebSocket {}",
        event
    );
}

/// Log a client message the server refused before it reached a room
///
/// Rate limiting and malformed JSON end up here; game rule rejections are
/// reported by the room itself.
pub fn log_refused_message(room_id: &str, player_id: &str, reason: &str) {
    tracing::warn!(
        room_id = room_id,
        player_id = player_id,
        reason = reason,
        "Refused client message"
    );
}
