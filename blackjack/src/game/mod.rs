//! Blackjack game engine.
//!
//! - [`entities`]: cards, the shoe, hands, players, and the dealer
//! - [`functional`]: hand scoring
//! - [`state_machine`]: round state and phase transitions
//! - [`actions`]: player commands, joins, leaves, and timeouts
//! - [`dealer`]: dealer play and settlement
//! - [`views`]: what clients get to see

pub mod actions;
pub mod constants;
pub mod dealer;
pub mod entities;
pub mod functional;
pub mod state_machine;
pub mod views;

pub use actions::{Command, CommandKind};
pub use state_machine::{GameEvent, GameSettings, Phase, Rejection, RoundState};
pub use views::RoundView;
