//! WebSocket handler for live play.
//!
//! # Connection Flow
//!
//! 1. Client connects via `GET /ws/{room_id}?player_id=<id>&display_name=<name>`
//! 2. The player's profile is loaded (or created with the starting balance)
//!    and they are seated in the room, which is created on first use
//! 3. Server spawns a send task that forwards every [`RoomEvent`] as JSON
//! 4. Client messages are parsed into commands and sent to the room
//! 5. On disconnect the player leaves the room
//!
//! # Client Messages
//!
//! ```json
//! {"type": "place_bet", "amount": 25}
//! {"type": "hit"}
//! {"type": "stand"}
//! {"type": "double_down"}
//! {"type": "leave"}
//! ```
//!
//! # Server Messages
//!
//! Room events (`state_snapshot`, `phase_changed`, `action_rejected`) plus
//! `seated` once the player has a seat and `error` for problems that never
//! reached the room (bad JSON, rate limiting, lost room).

use axum::{
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use blackjack::{
    Command, RoomEvent, RoomResponse,
    db::timeouts::with_default_timeout,
    entities::{Chips, PlayerId, RoomId},
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::{AppState, rate_limiter::RateLimiter};
use crate::{logging, metrics};

/// Room events buffered per socket. Past this the room skips events for it.
const EVENT_BUFFER: usize = 32;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    player_id: String,
    display_name: Option<String>,
}

/// Client messages received via WebSocket
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    PlaceBet { amount: Chips },
    Hit,
    Stand,
    DoubleDown,
    Leave,
}

impl ClientMessage {
    /// The game command this message carries. `None` for `leave`.
    fn command(&self) -> Option<Command> {
        match *self {
            Self::PlaceBet { amount } => Some(Command::PlaceBet { amount }),
            Self::Hit => Some(Command::Hit),
            Self::Stand => Some(Command::Stand),
            Self::DoubleDown => Some(Command::DoubleDown),
            Self::Leave => None,
        }
    }
}

/// Messages the transport itself sends, next to the room's events
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerResponse {
    Seated {
        room_id: RoomId,
        player_id: PlayerId,
        balance: Chips,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Session {
    room_id: RoomId,
    player_id: PlayerId,
    display_name: String,
}

impl Session {
    fn from_request(room_id: &str, query: WsQuery) -> Result<Self, &'static str> {
        let room_id = RoomId::new(room_id);
        let player_id = PlayerId::new(&query.player_id);
        if room_id.as_str().is_empty() {
            return Err("room_id must not be empty");
        }
        if player_id.as_str().is_empty() {
            return Err("player_id must not be empty");
        }

        let display_name = query
            .display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| player_id.to_string());

        Ok(Self {
            room_id,
            player_id,
            display_name,
        })
    }
}

/// Upgrade an HTTP connection to a WebSocket seated in `room_id`.
///
/// Returns `400 Bad Request` when the room or player id is blank.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let session = match Session::from_request(&room_id, query) {
        Ok(session) => session,
        Err(reason) => {
            metrics::http_requests_total("/ws/{room_id}", StatusCode::BAD_REQUEST.as_u16());
            return (StatusCode::BAD_REQUEST, reason).into_response();
        }
    };

    metrics::http_requests_total("/ws/{room_id}", StatusCode::SWITCHING_PROTOCOLS.as_u16());
    ws.on_upgrade(move |socket| handle_socket(socket, session, state))
}

async fn handle_socket(socket: WebSocket, session: Session, state: AppState) {
    metrics::websocket_connected();
    logging::log_session_event(
        "connected",
        session.room_id.as_str(),
        session.player_id.as_str(),
    );

    run_session(socket, &session, &state).await;

    metrics::websocket_disconnected();
    logging::log_session_event(
        "disconnected",
        session.room_id.as_str(),
        session.player_id.as_str(),
    );
}

async fn run_session(socket: WebSocket, session: &Session, state: &AppState) {
    let Session {
        room_id,
        player_id,
        display_name,
    } = session;
    let (mut sender, mut receiver) = socket.split();

    let balance = match seat_player(state, session).await {
        Ok(balance) => balance,
        Err(message) => {
            let _ = send_json(&mut sender, &ServerResponse::Error { message }).await;
            let _ = sender.close().await;
            return;
        }
    };

    let (event_tx, mut event_rx) = mpsc::channel::<RoomEvent>(EVENT_BUFFER);
    if let Err(e) = state.registry.subscribe(room_id, player_id, event_tx).await {
        error!("Failed to subscribe {player_id} to room {room_id}: {e}");
        let _ = state.registry.leave(room_id, player_id).await;
        return;
    }
    info!("{display_name} ({player_id}) seated in room {room_id} with {balance} chips");

    let (response_tx, mut response_rx) = mpsc::channel::<ServerResponse>(EVENT_BUFFER);
    let _ = response_tx
        .send(ServerResponse::Seated {
            room_id: room_id.clone(),
            player_id: player_id.clone(),
            balance,
        })
        .await;

    // Resolves to true when the room stopped sending events on its own.
    let mut send_task = tokio::spawn(async move {
        loop {
            let sent = tokio::select! {
                event = event_rx.recv() => match event {
                    Some(event) => send_json(&mut sender, &event).await,
                    None => return true,
                },
                Some(response) = response_rx.recv() => send_json(&mut sender, &response).await,
            };
            if sent.is_err() {
                return false;
            }
        }
    });

    let mut limiter = RateLimiter::for_websocket();
    let mut room_hung_up = false;
    let mut left = false;

    loop {
        let msg = tokio::select! {
            msg = receiver.next() => msg,
            ended = &mut send_task => {
                room_hung_up = ended.unwrap_or(false);
                break;
            }
        };

        let text = match msg {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => break,
            Some(Err(e)) => {
                warn!("WebSocket error for {player_id} in room {room_id}: {e}");
                break;
            }
            Some(Ok(_)) => continue,
        };
        metrics::websocket_messages_received();

        if let Err(limited) = limiter.check() {
            metrics::rate_limit_hits_total();
            let message = limited.to_string();
            logging::log_refused_message(room_id.as_str(), player_id.as_str(), &message);
            let _ = response_tx.send(ServerResponse::Error { message }).await;
            continue;
        }

        let client_msg = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(client_msg) => client_msg,
            Err(e) => {
                debug!("Unparseable message from {player_id}: {e}");
                logging::log_refused_message(
                    room_id.as_str(),
                    player_id.as_str(),
                    "invalid message format",
                );
                let _ = response_tx
                    .send(ServerResponse::Error {
                        message: "Invalid message format".to_string(),
                    })
                    .await;
                continue;
            }
        };

        let Some(command) = client_msg.command() else {
            left = true;
            break;
        };

        match state.registry.act(room_id, player_id, command).await {
            // Rejections reach the client as `action_rejected` room events.
            Ok(response) => {
                metrics::command_processed(command_label(command), response.is_success());
            }
            Err(e) => {
                let _ = response_tx
                    .send(ServerResponse::Error {
                        message: e.to_string(),
                    })
                    .await;
            }
        }
    }

    send_task.abort();

    if room_hung_up && !left {
        // A newer socket for the same player took over the subscription,
        // or the player is no longer seated. Either way the seat isn't ours.
        info!("Room {room_id} stopped sending events to {player_id}; keeping seat");
        return;
    }

    match state.registry.leave(room_id, player_id).await {
        Ok(RoomResponse::Left { room_closed }) => {
            info!("{player_id} left room {room_id} (room closed: {room_closed})");
        }
        Ok(response) => {
            debug!("{player_id} leaving room {room_id}: {response:?}");
            let _ = state.registry.unsubscribe(room_id, player_id).await;
        }
        Err(e) => debug!("{player_id} leaving room {room_id}: {e}"),
    }
}

/// Loads or creates the player's profile and takes a seat. Returns the
/// balance they sat down with.
async fn seat_player(state: &AppState, session: &Session) -> Result<Chips, String> {
    let repository = state.registry.repository();
    let Session {
        room_id,
        player_id,
        display_name,
    } = session;

    let profile = match with_default_timeout(repository.fetch_profile(player_id)).await {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            let starting_balance = state.registry.config().starting_balance;
            with_default_timeout(repository.create_profile(
                player_id,
                display_name,
                starting_balance,
            ))
            .await
            .map_err(|e| {
                error!("Failed to create profile for {player_id}: {e}");
                e.client_message()
            })?
        }
        Err(e) => {
            error!("Failed to load profile for {player_id}: {e}");
            return Err(e.client_message());
        }
    };

    match state
        .registry
        .join(room_id, player_id, display_name, profile.balance)
        .await
    {
        Ok(RoomResponse::Rejected(rejection)) => Err(rejection.to_string()),
        Ok(_) => Ok(profile.balance),
        Err(e) => Err(e.to_string()),
    }
}

async fn send_json<T: Serialize>(
    sender: &mut SplitSink<WebSocket, Message>,
    payload: &T,
) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(payload) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize outgoing message: {e}");
            return Ok(());
        }
    };
    sender.send(Message::Text(json.into())).await?;
    metrics::websocket_messages_sent();
    Ok(())
}

fn command_label(command: Command) -> &'static str {
    match command {
        Command::PlaceBet { .. } => "place_bet",
        Command::Hit => "hit",
        Command::Stand => "stand",
        Command::DoubleDown => "double_down",
    }
}
