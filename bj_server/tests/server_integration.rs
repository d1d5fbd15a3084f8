//! Integration tests for the HTTP/WebSocket router.
//!
//! Profiles live in memory, so these run without a database.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bj_server::api::{AppState, create_router};
use blackjack::{
    Command, RoomConfig, RoomRegistry, RoomResponse,
    db::{InMemoryProfileRepository, PlayerProfile},
    entities::{PlayerId, RoomId},
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tower::ServiceExt; // For `oneshot` method

/// Helper to create test server backed by in-memory profiles
fn create_test_server() -> (axum::Router, Arc<RoomRegistry>) {
    let repository = InMemoryProfileRepository::with_profiles([PlayerProfile::new(
        PlayerId::new("alice"),
        "Alice",
        500,
    )]);
    let registry = Arc::new(RoomRegistry::new(
        RoomConfig::default(),
        Arc::new(repository),
    ));

    let app = create_router(AppState {
        registry: Arc::clone(&registry),
        database: None,
    });

    (app, registry)
}

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

// ============================================================================
// Health Check Tests
// ============================================================================

#[tokio::test]
async fn test_health_check_endpoint() {
    let (app, _) = create_test_server();

    let (status, body) = get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "in_memory");
    assert_eq!(body["rooms"]["active_count"], 0);
}

#[tokio::test]
async fn test_request_timeout_handling() {
    let (app, _) = create_test_server();

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let result = timeout(Duration::from_secs(5), app.oneshot(request)).await;

    assert!(result.is_ok(), "Request should complete within timeout");
    assert_eq!(result.unwrap().unwrap().status(), StatusCode::OK);
}

// ============================================================================
// Room Listing Tests
// ============================================================================

#[tokio::test]
async fn test_list_rooms_empty() {
    let (app, _) = create_test_server();

    let (status, body) = get_json(app, "/api/rooms").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Array(vec![]));
}

#[tokio::test]
async fn test_list_rooms_after_joins() {
    let (app, registry) = create_test_server();
    let alice = PlayerId::new("alice");
    let bob = PlayerId::new("bob");

    registry
        .join(&RoomId::new("zeta"), &alice, "Alice", 500)
        .await
        .unwrap();
    registry
        .join(&RoomId::new("alpha"), &bob, "Bob", 1000)
        .await
        .unwrap();

    let (status, body) = get_json(app, "/api/rooms").await;

    assert_eq!(status, StatusCode::OK);
    let rooms = body.as_array().unwrap();
    assert_eq!(rooms.len(), 2);
    assert_eq!(rooms[0]["room_id"], "alpha");
    assert_eq!(rooms[1]["room_id"], "zeta");
    assert_eq!(rooms[0]["phase"], "betting");
    assert_eq!(rooms[0]["player_count"], 1);
    assert_eq!(rooms[0]["max_players"], 7);
}

#[tokio::test]
async fn test_get_room_snapshot() {
    let (app, registry) = create_test_server();
    let room = RoomId::new("lobby");
    let alice = PlayerId::new("alice");

    registry.join(&room, &alice, "Alice", 500).await.unwrap();
    let response = registry
        .act(&room, &alice, Command::PlaceBet { amount: 20 })
        .await
        .unwrap();
    assert_eq!(response, RoomResponse::Success);

    let (status, body) = get_json(app, "/api/rooms/lobby").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["players"][0]["id"], "alice");
    assert_eq!(body["players"][0]["bet"], 20);
    assert_eq!(body["min_bet"], 10);
    assert_eq!(body["max_bet"], 100);
    assert!(body["message_log"].as_array().unwrap().len() <= 20);

    // Either the dealer's second card is still hidden or the round moved on.
    let dealer_cards = body["dealer"]["hand"].as_array().unwrap();
    if body["phase"] == "player_turns" {
        assert_eq!(dealer_cards.len(), 2);
        assert_eq!(dealer_cards[1]["face_down"], true);
        assert!(dealer_cards[1]["suit"].is_null());
    }
}

#[tokio::test]
async fn test_get_unknown_room_is_not_found() {
    let (app, _) = create_test_server();

    let (status, body) = get_json(app, "/api/rooms/nowhere").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nowhere"));
}

#[tokio::test]
async fn test_room_disappears_after_last_leave() {
    let (app, registry) = create_test_server();
    let room = RoomId::new("lobby");
    let alice = PlayerId::new("alice");

    registry.join(&room, &alice, "Alice", 500).await.unwrap();
    let response = registry.leave(&room, &alice).await.unwrap();
    assert_eq!(response, RoomResponse::Left { room_closed: true });

    let (status, body) = get_json(app.clone(), "/api/rooms").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Array(vec![]));

    let (status, _) = get_json(app, "/api/rooms/lobby").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// WebSocket Upgrade Tests
// ============================================================================

#[tokio::test]
async fn test_websocket_requires_player_id() {
    let (app, _) = create_test_server();

    let request = Request::builder()
        .uri("/ws/lobby")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_websocket_plain_http_is_refused() {
    let (app, registry) = create_test_server();

    // No upgrade headers: the request never reaches a room.
    let request = Request::builder()
        .uri("/ws/lobby?player_id=alice")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert!(response.status().is_client_error());
    assert_eq!(registry.room_count().await, 0);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (app, _) = create_test_server();

    let request = Request::builder()
        .uri("/api/tables")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
