//! Room actor message types.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::game::{
    Command, CommandKind, Phase, Rejection, RoundView,
    entities::{Chips, PlayerId, RoomId},
};

/// Messages a [`RoomActor`](super::RoomActor) accepts.
#[derive(Debug)]
pub enum RoomMessage {
    Join {
        player_id: PlayerId,
        display_name: String,
        balance: Chips,
        response: oneshot::Sender<RoomResponse>,
    },

    Leave {
        player_id: PlayerId,
        response: oneshot::Sender<RoomResponse>,
    },

    /// Bet, hit, stand, or double down
    Act {
        player_id: PlayerId,
        command: Command,
        response: oneshot::Sender<RoomResponse>,
    },

    GetView {
        response: oneshot::Sender<RoundView>,
    },

    /// Register for room events. Replaces any earlier subscription for the
    /// same player.
    Subscribe {
        player_id: PlayerId,
        sender: mpsc::Sender<RoomEvent>,
    },

    Unsubscribe {
        player_id: PlayerId,
    },

    /// A delayed event firing. Dropped when it no longer matches the round.
    Scheduled(ScheduledEvent),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomResponse {
    Success,

    /// The player is gone. `room_closed` is set when they were the last one.
    Left { room_closed: bool },

    Rejected(Rejection),
}

impl RoomResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::Left { .. })
    }

    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Rejected(rejection) => Some(rejection.to_string()),
            _ => None,
        }
    }
}

/// Everything a room pushes to its subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomEvent {
    StateSnapshot {
        state: Box<RoundView>,
    },
    PhaseChanged {
        phase: Phase,
        message: Option<String>,
        current_turn: Option<PlayerId>,
    },
    /// Only ever sent to the player whose command was refused.
    ActionRejected {
        player_id: PlayerId,
        kind: CommandKind,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduledKind {
    DealerPlay,
    NextRound,
    TurnTimeout { player_id: PlayerId, turn_seq: u64 },
    BettingTimeout,
}

/// A timer firing, tagged with the round it was armed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledEvent {
    pub round_id: Uuid,
    pub kind: ScheduledKind,
}

/// Failures talking to a room, as opposed to a room refusing a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    #[error("room {0} is closed")]
    RoomClosed(RoomId),
}

/// One line of the lobby listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub phase: Phase,
    pub player_count: usize,
    pub max_players: usize,
    pub min_bet: Chips,
    pub max_bet: Chips,
}

impl RoomSummary {
    pub fn from_view(room_id: RoomId, view: &RoundView) -> Self {
        Self {
            room_id,
            phase: view.phase,
            player_count: view.players.len(),
            max_players: view.max_players,
            min_bet: view.min_bet,
            max_bet: view.max_bet,
        }
    }
}
