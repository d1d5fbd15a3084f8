//! Table rules and limits shared across the engine.

use super::entities::Chips;

/// Best possible hand total.
pub const BLACKJACK: u8 = 21;

/// Dealer keeps drawing while below this total.
pub const DEALER_STAND_THRESHOLD: u8 = 17;

/// Difference between an ace counted high and counted low.
pub const ACE_ADJUSTMENT: u8 = 10;

pub const CARDS_PER_DECK: usize = 52;

pub const DEFAULT_NUM_DECKS: usize = 6;
pub const DEFAULT_MIN_BET: Chips = 10;
pub const DEFAULT_MAX_BET: Chips = 100;
pub const DEFAULT_MAX_PLAYERS: usize = 7;
pub const DEFAULT_STARTING_BALANCE: Chips = 1000;

/// Hard cap on seats regardless of configuration.
pub const MAX_PLAYERS: usize = 7;

/// Longest player, room, or display name kept after trimming.
pub const MAX_ID_LENGTH: usize = 32;

/// Oldest log lines are dropped past this many entries.
pub const MAX_LOG_ENTRIES: usize = 256;

/// How many trailing log lines a round view carries.
pub const VIEW_LOG_ENTRIES: usize = 20;
