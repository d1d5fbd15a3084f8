//! Room lobby API handlers.
//!
//! Read-only: rooms are created by the first WebSocket join and disappear
//! when the last player leaves.
//!
//! # Examples
//!
//! ```bash
//! curl http://localhost:6969/api/rooms
//! curl http://localhost:6969/api/rooms/lobby
//! ```

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use blackjack::{
    RoomError, RoundView,
    entities::RoomId,
    room::RoomSummary,
};
use serde::Serialize;

use super::AppState;
use crate::metrics;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// List all live rooms, sorted by id.
///
/// # Response
///
/// Returns `200 OK` with array of room summaries:
/// ```json
/// [
///   {
///     "room_id": "lobby",
///     "phase": "player_turns",
///     "player_count": 3,
///     "max_players": 7,
///     "min_bet": 10,
///     "max_bet": 100
///   }
/// ]
/// ```
pub async fn list_rooms(State(state): State<AppState>) -> Json<Vec<RoomSummary>> {
    let rooms = state.registry.list_rooms().await;
    metrics::active_rooms(rooms.len());
    metrics::http_requests_total("/api/rooms", StatusCode::OK.as_u16());
    Json(rooms)
}

/// Current state of one room, as every player sees it (hole card hidden).
///
/// # Errors
///
/// - `404 Not Found`: No live room with that id
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoundView>, (StatusCode, Json<ErrorResponse>)> {
    let room_id = RoomId::new(&room_id);
    let result = state.registry.snapshot(&room_id).await;
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(RoomError::RoomNotFound(_) | RoomError::RoomClosed(_)) => StatusCode::NOT_FOUND,
    };
    metrics::http_requests_total("/api/rooms/{room_id}", status.as_u16());

    result.map(Json).map_err(|e| {
        (
            status,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
    })
}
