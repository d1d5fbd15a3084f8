//! # Blackjack
//!
//! A multi-room Blackjack engine. Each room plays rounds against a house
//! dealer with any number of seated players, driven by a small phase
//! machine:
//!
//! - **WaitingForPlayers**: empty room, nothing to do
//! - **Betting**: everyone seated places a bet
//! - **DealingInitial**: two cards each, dealer's second face down
//! - **PlayerTurns**: hit, stand, or double down in seating order
//! - **DealerTurn**: dealer reveals and draws to 17
//! - **RoundOver**: bets settled, next round opens after a pause
//!
//! ## Core Modules
//!
//! - [`game`]: cards, scoring, the round state, and the rules
//! - [`room`]: one actor per room plus the registry that finds them
//! - [`db`]: player profiles (balance, wins, losses)
//!
//! ## Example
//!
//! ```
//! use blackjack::game::{Command, GameSettings, RoundState, actions};
//! use blackjack::game::entities::PlayerId;
//!
//! let alice = PlayerId::new("alice");
//! let state = RoundState::new(GameSettings::default());
//! let state = actions::join(&state, &alice, "Alice", 1000).unwrap();
//! let state = actions::apply(&state, &alice, Command::PlaceBet { amount: 10 }).unwrap();
//! assert_eq!(state.player(&alice).unwrap().hand.len(), 2);
//! ```

/// Player profile persistence.
pub mod db;

/// Core game logic, entities, and state machine.
pub mod game;
pub use game::{
    Command, CommandKind, GameSettings, Phase, Rejection, RoundState, RoundView,
    constants::{self, DEFAULT_MAX_PLAYERS, DEFAULT_MIN_BET},
    entities::{self, Chips, PlayerId, RoomId},
    functional,
};

/// Room actors and the room registry.
pub mod room;
pub use room::{RoomConfig, RoomError, RoomEvent, RoomRegistry, RoomResponse};
