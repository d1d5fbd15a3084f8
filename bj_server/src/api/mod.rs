//! HTTP/WebSocket API for the blackjack server.
//!
//! # Modules
//!
//! - [`rooms`]: Lobby listing and room snapshots
//! - [`websocket`]: Live play, one socket per seated player
//! - [`rate_limiter`]: Per-socket message throttling
//!
//! # Endpoints Overview
//!
//! ```text
//! GET /health                        - Server health status
//! GET /api/rooms                     - List live rooms
//! GET /api/rooms/{room_id}           - Current view of one room
//! GET /ws/{room_id}?player_id=<id>   - Join a room and play over WebSocket
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use bj_server::api::{AppState, create_router};
//! use blackjack::{RoomConfig, RoomRegistry, db::InMemoryProfileRepository};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = RoomRegistry::new(
//!     RoomConfig::default(),
//!     Arc::new(InMemoryProfileRepository::new()),
//! );
//! let state = AppState {
//!     registry: Arc::new(registry),
//!     database: None,
//! };
//!
//! let app = create_router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively for development. In production, configure
//! appropriate origins, methods, and headers.

pub mod rate_limiter;
pub mod rooms;
pub mod websocket;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
};
use blackjack::{RoomRegistry, db::Database};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::metrics;

/// Application state shared across all HTTP handlers and WebSocket connections.
///
/// This state is cloned for each request (cheap due to Arc wrappers).
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RoomRegistry>,
    /// Present when profiles live in PostgreSQL; checked by `/health`.
    pub database: Option<Database>,
}

/// Create the complete API router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/rooms", get(rooms::list_rooms))
        .route("/rooms/{room_id}", get(rooms::get_room));

    Router::new()
        .route("/health", get(health_check))
        .route("/ws/{room_id}", get(websocket::websocket_handler))
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` if the profile store is reachable, or
/// `503 Service Unavailable` if the database check fails.
///
/// ```bash
/// curl http://localhost:6969/health
/// # {"status":"healthy","database":"in_memory","rooms":{"active_count":0},...}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match &state.database {
        Some(db) => match db.health_check().await {
            Ok(()) => "connected",
            Err(e) => {
                log::error!("Database health check failed: {e}");
                "unreachable"
            }
        },
        None => "in_memory",
    };
    let healthy = database != "unreachable";
    let room_count = state.registry.room_count().await;
    metrics::active_rooms(room_count);

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    metrics::http_requests_total("/health", status_code.as_u16());

    let response = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
        "rooms": {
            "active_count": room_count
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
