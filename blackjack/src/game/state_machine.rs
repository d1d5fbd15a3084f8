//! Round state and the phase engine.
//!
//! A room owns exactly one [`RoundState`]. Every public entry point takes the
//! current state by reference, mutates a private clone, and hands the clone
//! back only on success, so a rejected command never leaves a half-applied
//! state behind. Side effects the room has to act on (broadcasts, timers,
//! persistence) are queued as [`GameEvent`]s and drained by the caller.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, fmt};
use thiserror::Error;
use uuid::Uuid;

use super::{
    actions::CommandKind,
    constants::{
        DEFAULT_MAX_BET, DEFAULT_MAX_PLAYERS, DEFAULT_MIN_BET, DEFAULT_NUM_DECKS, MAX_LOG_ENTRIES,
    },
    entities::{
        Chips, DealerState, DealerStatus, Deck, DeckError, PlayerId, PlayerState, PlayerStatus, Settlement,
        TurnOutcome,
    },
};

/// Reasons a command is refused. The state is never modified when one of
/// these comes back.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum Rejection {
    #[error("can't do that during {phase}")]
    InvalidPhase { phase: Phase },
    #[error("not your turn")]
    NotCurrentTurn,
    #[error("player not found")]
    PlayerNotFound,
    #[error("bet must be between {min} and {max} and no more than your balance of {balance}")]
    InvalidBetAmount { min: Chips, max: Chips, balance: Chips },
    #[error("need {required} chips to double down, have {available}")]
    InsufficientBalanceForDouble { required: Chips, available: Chips },
    #[error("no cards left in the shoe")]
    DeckExhausted,
    #[error("can't {0} right now")]
    ActionNotAllowed(CommandKind),
    #[error("room is full")]
    RoomFull,
}

impl From<DeckError> for Rejection {
    fn from(_: DeckError) -> Self {
        Self::DeckExhausted
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    WaitingForPlayers,
    Betting,
    /// Transient. Never observed between commands.
    DealingInitial,
    PlayerTurns,
    DealerTurn,
    RoundOver,
}

impl Phase {
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::WaitingForPlayers, Self::Betting)
                | (Self::Betting, Self::Betting)
                | (Self::Betting, Self::DealingInitial)
                | (Self::DealingInitial, Self::PlayerTurns)
                | (Self::PlayerTurns, Self::DealerTurn)
                | (Self::DealerTurn, Self::RoundOver)
                | (Self::RoundOver, Self::Betting)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::WaitingForPlayers => "waiting_for_players",
            Self::Betting => "betting",
            Self::DealingInitial => "dealing_initial",
            Self::PlayerTurns => "player_turns",
            Self::DealerTurn => "dealer_turn",
            Self::RoundOver => "round_over",
        };
        write!(f, "{repr}")
    }
}

/// Things the owner of a [`RoundState`] has to react to after a commit.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum GameEvent {
    PhaseChanged {
        phase: Phase,
        message: Option<String>,
    },
    /// A player's turn began. `turn_seq` identifies this particular turn so
    /// a timeout armed for it can tell whether it is stale.
    TurnStarted {
        player_id: PlayerId,
        turn_seq: u64,
    },
    Reshuffled,
    /// A bet was resolved, either at the end of the round or by forfeit.
    Settled(Settlement),
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct GameSettings {
    pub num_decks: usize,
    pub min_bet: Chips,
    pub max_bet: Chips,
    pub max_players: usize,
}

impl GameSettings {
    #[must_use]
    pub const fn new(num_decks: usize, min_bet: Chips, max_bet: Chips, max_players: usize) -> Self {
        Self {
            num_decks,
            min_bet,
            max_bet,
            max_players,
        }
    }
}

impl Default for GameSettings {
    fn default() -> Self {
        Self::new(
            DEFAULT_NUM_DECKS,
            DEFAULT_MIN_BET,
            DEFAULT_MAX_BET,
            DEFAULT_MAX_PLAYERS,
        )
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RoundState {
    pub round_id: Uuid,
    pub phase: Phase,
    /// Seating order. Turns go left to right.
    pub players: Vec<PlayerState>,
    pub dealer: DealerState,
    pub current_turn: Option<PlayerId>,
    pub min_bet: Chips,
    pub max_bet: Chips,
    pub message_log: VecDeque<String>,
    pub last_action_at: DateTime<Utc>,
    /// Bumped every time a turn starts.
    pub turn_seq: u64,
    deck: Deck,
    settings: GameSettings,
    events: VecDeque<GameEvent>,
}

impl RoundState {
    #[must_use]
    pub fn new(settings: GameSettings) -> Self {
        Self::with_deck(settings, Deck::new_shuffled(settings.num_decks))
    }

    #[must_use]
    pub fn with_deck(settings: GameSettings, deck: Deck) -> Self {
        Self {
            round_id: Uuid::new_v4(),
            phase: Phase::WaitingForPlayers,
            players: Vec::with_capacity(settings.max_players),
            dealer: DealerState::default(),
            current_turn: None,
            min_bet: settings.min_bet,
            max_bet: settings.max_bet,
            message_log: VecDeque::new(),
            last_action_at: Utc::now(),
            turn_seq: 0,
            deck,
            settings,
            events: VecDeque::new(),
        }
    }

    #[must_use]
    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub(crate) fn deck_mut(&mut self) -> &mut Deck {
        &mut self.deck
    }

    #[must_use]
    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    /// Takes every event queued since the last drain.
    pub fn drain_events(&mut self) -> VecDeque<GameEvent> {
        std::mem::take(&mut self.events)
    }

    #[must_use]
    pub fn player(&self, player_id: &PlayerId) -> Option<&PlayerState> {
        self.players.iter().find(|player| &player.id == player_id)
    }

    pub(crate) fn player_index(&self, player_id: &PlayerId) -> Result<usize, Rejection> {
        self.players
            .iter()
            .position(|player| &player.id == player_id)
            .ok_or(Rejection::PlayerNotFound)
    }

    #[must_use]
    pub fn is_current_turn(&self, player_id: &PlayerId) -> bool {
        self.current_turn.as_ref() == Some(player_id)
    }

    /// First seat at or after `start` (wrapping) whose status is Playing.
    #[must_use]
    pub fn next_playing_from(&self, start: usize) -> Option<usize> {
        let n = self.players.len();
        (0..n)
            .map(|offset| (start + offset) % n)
            .find(|&idx| self.players[idx].status == PlayerStatus::Playing)
    }

    /// Who would act after `player_id`, skipping anyone not Playing.
    #[must_use]
    pub fn next_playing_after(&self, player_id: &PlayerId) -> Option<PlayerId> {
        let idx = self.player_index(player_id).ok()?;
        self.next_playing_from(idx + 1)
            .map(|next| self.players[next].id.clone())
    }

    pub(crate) fn push_event(&mut self, event: GameEvent) {
        self.events.push_back(event);
    }

    pub(crate) fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!("[round {}] {message}", self.round_id);
        self.message_log.push_back(message);
        while self.message_log.len() > MAX_LOG_ENTRIES {
            self.message_log.pop_front();
        }
        self.last_action_at = Utc::now();
    }

    pub(crate) fn transition(&mut self, next: Phase, message: Option<String>) {
        if !self.phase.can_transition_to(next) {
            warn!("unexpected phase transition {} -> {next}", self.phase);
        }
        self.phase = next;
        if let Some(message) = &message {
            self.log(message.clone());
        }
        self.push_event(GameEvent::PhaseChanged {
            phase: next,
            message,
        });
    }

    /// Clears the table and opens betting for a fresh round.
    pub(crate) fn start_betting(&mut self) {
        self.round_id = Uuid::new_v4();
        self.current_turn = None;
        self.dealer.reset();
        let min_bet = self.min_bet;
        let mut broke = Vec::new();
        for player in &mut self.players {
            player.reset_for_round();
            if player.balance >= min_bet {
                player.status = PlayerStatus::Betting;
            } else {
                broke.push(player.display_name.clone());
            }
        }
        for name in broke {
            self.log(format!("{name} can't cover the minimum bet and sits out."));
        }
        self.transition(Phase::Betting, Some("Place your bets!".to_string()));
    }

    /// Deals two cards to every bettor and the dealer (second dealer card
    /// face down), marks naturals, and hands the turn to the first Playing
    /// seat.
    pub(crate) fn deal_initial(&mut self) -> Result<(), Rejection> {
        self.transition(Phase::DealingInitial, None);

        let bettors: Vec<usize> = self
            .players
            .iter()
            .enumerate()
            .filter(|(_, player)| player.bet.is_some())
            .map(|(idx, _)| idx)
            .collect();

        let required = bettors.len() * 2 + 2;
        if self.deck.remaining() < required {
            self.deck.reshuffle();
            self.log("Reshuffling the shoe.");
            self.push_event(GameEvent::Reshuffled);
        }

        self.dealer.reset();
        for pass in 0..2 {
            for &idx in &bettors {
                let card = self.deck.deal()?;
                self.players[idx].receive(card);
            }
            let mut card = self.deck.deal()?;
            card.face_down = pass == 1;
            self.dealer.receive(card);
        }

        for &idx in &bettors {
            let player = &mut self.players[idx];
            if player.hand.is_natural() {
                player.status = PlayerStatus::Finished {
                    turn: TurnOutcome::NaturalBlackjack,
                };
                let name = player.display_name.clone();
                self.log(format!("{name} has Blackjack!"));
            } else {
                player.status = PlayerStatus::Playing;
                player.flags.can_double = true;
            }
        }

        self.transition(
            Phase::PlayerTurns,
            Some("Cards dealt. Player turns begin.".to_string()),
        );
        self.advance_turn(0);
        Ok(())
    }

    fn begin_turn(&mut self, idx: usize) {
        self.turn_seq += 1;
        let player = &mut self.players[idx];
        player.flags.can_hit = true;
        player.flags.can_stand = true;
        let player_id = player.id.clone();
        let name = player.display_name.clone();
        self.current_turn = Some(player_id.clone());
        self.log(format!("It's {name}'s turn."));
        self.push_event(GameEvent::TurnStarted {
            player_id,
            turn_seq: self.turn_seq,
        });
    }

    /// Gives the turn to the next Playing seat at or after `start`, or to
    /// the dealer when nobody is left.
    pub(crate) fn advance_turn(&mut self, start: usize) {
        match self.next_playing_from(start) {
            Some(idx) => self.begin_turn(idx),
            None => {
                self.current_turn = None;
                self.dealer.status = DealerStatus::Playing;
                self.transition(
                    Phase::DealerTurn,
                    Some("All players finished. Dealer's turn.".to_string()),
                );
            }
        }
    }

    pub(crate) fn finish_turn(&mut self, idx: usize, outcome: TurnOutcome) {
        let player = &mut self.players[idx];
        player.status = PlayerStatus::Finished { turn: outcome };
        player.flags.clear();
        self.advance_turn(idx + 1);
    }

    /// Deals if every bettor has bet. Restarts betting when nobody did.
    pub(crate) fn close_betting_if_done(&mut self) -> Result<(), Rejection> {
        if self
            .players
            .iter()
            .any(|player| player.status == PlayerStatus::Betting)
        {
            return Ok(());
        }
        if self.players.iter().any(|player| player.bet.is_some()) {
            self.deal_initial()
        } else if !self.players.is_empty() {
            self.start_betting();
            Ok(())
        } else {
            Ok(())
        }
    }
}

/// Opens betting for the next round once the current one is over.
pub fn start_next_round(state: &RoundState) -> Result<RoundState, Rejection> {
    if state.phase != Phase::RoundOver {
        return Err(Rejection::InvalidPhase { phase: state.phase });
    }
    let mut next = state.clone();
    next.start_betting();
    Ok(next)
}

/// Starts the first round in a room that has been waiting for players.
pub fn start_betting(state: &RoundState) -> Result<RoundState, Rejection> {
    if !matches!(state.phase, Phase::WaitingForPlayers | Phase::RoundOver) {
        return Err(Rejection::InvalidPhase { phase: state.phase });
    }
    let mut next = state.clone();
    next.start_betting();
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::{Card, Rank, Suit};

    fn seated(ids: &[&str]) -> RoundState {
        let mut state = RoundState::new(GameSettings::default());
        for id in ids {
            state
                .players
                .push(PlayerState::new(PlayerId::new(id), id, 1000));
        }
        state
    }

    #[test]
    fn legal_transitions() {
        assert!(Phase::WaitingForPlayers.can_transition_to(Phase::Betting));
        assert!(Phase::Betting.can_transition_to(Phase::DealingInitial));
        assert!(Phase::DealingInitial.can_transition_to(Phase::PlayerTurns));
        assert!(Phase::PlayerTurns.can_transition_to(Phase::DealerTurn));
        assert!(Phase::DealerTurn.can_transition_to(Phase::RoundOver));
        assert!(Phase::RoundOver.can_transition_to(Phase::Betting));

        assert!(!Phase::Betting.can_transition_to(Phase::PlayerTurns));
        assert!(!Phase::RoundOver.can_transition_to(Phase::DealerTurn));
        assert!(!Phase::WaitingForPlayers.can_transition_to(Phase::RoundOver));
    }

    #[test]
    fn next_playing_wraps_and_skips() {
        let mut state = seated(&["a", "b", "c", "d"]);
        state.players[0].status = PlayerStatus::Playing;
        state.players[2].status = PlayerStatus::Playing;

        assert_eq!(state.next_playing_after(&PlayerId::new("a")), Some(PlayerId::new("c")));
        assert_eq!(state.next_playing_after(&PlayerId::new("c")), Some(PlayerId::new("a")));
        assert_eq!(state.next_playing_after(&PlayerId::new("b")), Some(PlayerId::new("c")));

        state.players[0].status = PlayerStatus::Finished {
            turn: TurnOutcome::Stood,
        };
        state.players[2].status = PlayerStatus::Finished {
            turn: TurnOutcome::Busted,
        };
        assert_eq!(state.next_playing_after(&PlayerId::new("a")), None);
    }

    #[test]
    fn start_betting_sits_out_broke_players() {
        let mut state = seated(&["rich", "broke"]);
        state.players[1].balance = 5;
        state.start_betting();

        assert_eq!(state.phase, Phase::Betting);
        assert_eq!(state.players[0].status, PlayerStatus::Betting);
        assert_eq!(state.players[1].status, PlayerStatus::Waiting);
        assert!(
            state
                .message_log
                .iter()
                .any(|line| line.contains("broke can't cover"))
        );
    }

    #[test]
    fn deal_reshuffles_short_shoe() {
        let mut state = seated(&["a", "b"]);
        state.start_betting();
        for player in &mut state.players {
            player.bet = Some(10);
            player.status = PlayerStatus::Waiting;
        }
        // 2 bettors need 6 cards.
        state.deck_mut().truncate(5);
        state.drain_events();

        state.deal_initial().unwrap();

        let full = state.deck().full_size();
        assert_eq!(state.deck().remaining(), full - 6);
        assert!(state.drain_events().contains(&GameEvent::Reshuffled));
        assert!(state.message_log.iter().any(|line| line == "Reshuffling the shoe."));
    }

    #[test]
    fn deal_marks_naturals_and_hides_hole_card() {
        let deck = Deck::stacked(
            vec![
                Card::new(Rank::Ace, Suit::Spades),
                Card::new(Rank::Nine, Suit::Hearts),
                Card::new(Rank::Six, Suit::Clubs),
                Card::new(Rank::King, Suit::Spades),
                Card::new(Rank::Seven, Suit::Hearts),
                Card::new(Rank::Ten, Suit::Clubs),
            ],
            1,
        );
        let mut state = RoundState::with_deck(GameSettings::default(), deck);
        state
            .players
            .push(PlayerState::new(PlayerId::new("a"), "a", 1000));
        state
            .players
            .push(PlayerState::new(PlayerId::new("b"), "b", 1000));
        state.start_betting();
        for player in &mut state.players {
            player.bet = Some(10);
            player.status = PlayerStatus::Waiting;
        }

        state.deal_initial().unwrap();

        assert_eq!(
            state.players[0].status,
            PlayerStatus::Finished {
                turn: TurnOutcome::NaturalBlackjack
            }
        );
        assert_eq!(state.players[1].status, PlayerStatus::Playing);
        assert!(state.players[1].flags.can_double);
        assert_eq!(state.current_turn, Some(PlayerId::new("b")));
        assert_eq!(state.phase, Phase::PlayerTurns);
        assert_eq!(state.dealer.score.total, 6);
        assert!(state.dealer.hand.cards()[1].face_down);
    }

    #[test]
    fn log_is_bounded() {
        let mut state = seated(&[]);
        for i in 0..(MAX_LOG_ENTRIES + 10) {
            state.log(format!("line {i}"));
        }
        assert_eq!(state.message_log.len(), MAX_LOG_ENTRIES);
        assert_eq!(state.message_log.front().map(String::as_str), Some("line 10"));
    }

    #[test]
    fn next_round_requires_round_over() {
        let state = seated(&["a"]);
        assert_eq!(
            start_next_round(&state),
            Err(Rejection::InvalidPhase {
                phase: Phase::WaitingForPlayers
            })
        );
    }
}
