//! Client-facing snapshots of a round. Face-down cards never leave the
//! room through these types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    constants::VIEW_LOG_ENTRIES,
    entities::{
        Card, Chips, DealerState, DealerStatus, Hand, PlayerId, PlayerState, PlayerStatus, Rank,
        Suit,
    },
    state_machine::{Phase, RoundState},
};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CardView {
    pub rank: Option<Rank>,
    pub suit: Option<Suit>,
    pub face_down: bool,
}

impl From<&Card> for CardView {
    fn from(card: &Card) -> Self {
        if card.face_down {
            Self {
                rank: None,
                suit: None,
                face_down: true,
            }
        } else {
            Self {
                rank: Some(card.rank),
                suit: Some(card.suit),
                face_down: false,
            }
        }
    }
}

fn hand_view(hand: &Hand) -> Vec<CardView> {
    hand.cards().iter().map(CardView::from).collect()
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub display_name: String,
    pub hand: Vec<CardView>,
    pub score: u8,
    pub is_soft: bool,
    pub bet: Option<Chips>,
    pub balance: Chips,
    pub status: PlayerStatus,
    /// Flat status name: waiting, betting, playing, busted, stood,
    /// blackjack, won, lost, or push.
    pub status_label: String,
    pub can_hit: bool,
    pub can_stand: bool,
    pub can_double: bool,
}

impl From<&PlayerState> for PlayerView {
    fn from(player: &PlayerState) -> Self {
        Self {
            id: player.id.clone(),
            display_name: player.display_name.clone(),
            hand: hand_view(&player.hand),
            score: player.score.total,
            is_soft: player.score.is_soft,
            bet: player.bet,
            balance: player.balance,
            status: player.status,
            status_label: player.status.label().to_string(),
            can_hit: player.flags.can_hit,
            can_stand: player.flags.can_stand,
            can_double: player.flags.can_double,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DealerView {
    pub hand: Vec<CardView>,
    pub score: u8,
    pub is_soft: bool,
    pub status: DealerStatus,
}

impl From<&DealerState> for DealerView {
    fn from(dealer: &DealerState) -> Self {
        Self {
            hand: hand_view(&dealer.hand),
            score: dealer.score.total,
            is_soft: dealer.score.is_soft,
            status: dealer.status,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RoundView {
    pub round_id: Uuid,
    pub phase: Phase,
    pub current_turn: Option<PlayerId>,
    pub players: Vec<PlayerView>,
    pub dealer: DealerView,
    pub min_bet: Chips,
    pub max_bet: Chips,
    pub max_players: usize,
    pub cards_remaining: usize,
    pub message_log: Vec<String>,
    pub last_action_at: DateTime<Utc>,
}

impl From<&RoundState> for RoundView {
    fn from(state: &RoundState) -> Self {
        let skip = state.message_log.len().saturating_sub(VIEW_LOG_ENTRIES);
        Self {
            round_id: state.round_id,
            phase: state.phase,
            current_turn: state.current_turn.clone(),
            players: state.players.iter().map(PlayerView::from).collect(),
            dealer: DealerView::from(&state.dealer),
            min_bet: state.min_bet,
            max_bet: state.max_bet,
            max_players: state.settings().max_players,
            cards_remaining: state.deck().remaining(),
            message_log: state.message_log.iter().skip(skip).cloned().collect(),
            last_action_at: state.last_action_at,
        }
    }
}

impl RoundState {
    #[must_use]
    pub fn view(&self) -> RoundView {
        RoundView::from(self)
    }
}
