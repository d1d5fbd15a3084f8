//! Room configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::game::{
    GameSettings,
    constants::{
        DEFAULT_MAX_BET, DEFAULT_MAX_PLAYERS, DEFAULT_MIN_BET, DEFAULT_NUM_DECKS,
        DEFAULT_STARTING_BALANCE, MAX_PLAYERS,
    },
    entities::Chips,
};

/// Rules and clocks every room is created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Decks in the shoe (default: 6)
    pub num_decks: usize,

    pub min_bet: Chips,
    pub max_bet: Chips,

    /// Seats per room (default: 7)
    pub max_players: usize,

    /// Balance for players with no stored profile
    pub starting_balance: Chips,

    /// Pause before the dealer plays out their hand
    pub dealer_delay_ms: u64,

    /// Pause between the end of a round and the next betting phase
    pub next_round_delay_ms: u64,

    /// A player who doesn't act within this window stands automatically
    pub turn_timeout_ms: u64,

    /// Players still betting after this window sit the round out
    pub betting_timeout_ms: u64,

    /// Capacity of each room's inbox
    pub inbox_capacity: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            num_decks: DEFAULT_NUM_DECKS,
            min_bet: DEFAULT_MIN_BET,
            max_bet: DEFAULT_MAX_BET,
            max_players: DEFAULT_MAX_PLAYERS,
            starting_balance: DEFAULT_STARTING_BALANCE,
            dealer_delay_ms: 1_000,
            next_round_delay_ms: 5_000,
            turn_timeout_ms: 30_000,
            betting_timeout_ms: 60_000,
            inbox_capacity: 100,
        }
    }
}

impl RoomConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.num_decks == 0 || self.num_decks > 8 {
            return Err("Number of decks must be between 1 and 8".to_string());
        }

        if self.min_bet <= 0 {
            return Err("Minimum bet must be positive".to_string());
        }

        if self.max_bet < self.min_bet {
            return Err("Maximum bet must be at least the minimum bet".to_string());
        }

        if self.max_players == 0 || self.max_players > MAX_PLAYERS {
            return Err(format!("Max players must be between 1 and {MAX_PLAYERS}"));
        }

        if self.starting_balance < 0 {
            return Err("Starting balance can't be negative".to_string());
        }

        if self.inbox_capacity == 0 {
            return Err("Inbox capacity must be positive".to_string());
        }

        Ok(())
    }

    pub fn game_settings(&self) -> GameSettings {
        GameSettings::new(self.num_decks, self.min_bet, self.max_bet, self.max_players)
    }

    pub fn dealer_delay(&self) -> Duration {
        Duration::from_millis(self.dealer_delay_ms)
    }

    pub fn next_round_delay(&self) -> Duration {
        Duration::from_millis(self.next_round_delay_ms)
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::from_millis(self.turn_timeout_ms)
    }

    pub fn betting_timeout(&self) -> Duration {
        Duration::from_millis(self.betting_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RoomConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.dealer_delay(), Duration::from_secs(1));
        assert_eq!(config.next_round_delay(), Duration::from_secs(5));
        assert_eq!(config.turn_timeout(), Duration::from_secs(30));
        assert_eq!(config.betting_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn rejects_inverted_bet_limits() {
        let config = RoomConfig {
            min_bet: 50,
            max_bet: 20,
            ..RoomConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_too_many_seats() {
        let config = RoomConfig {
            max_players: MAX_PLAYERS + 1,
            ..RoomConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_shoe() {
        let config = RoomConfig {
            num_decks: 0,
            ..RoomConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
