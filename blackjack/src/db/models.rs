//! Persisted player data.

use serde::{Deserialize, Serialize};

use crate::game::entities::{Chips, PlayerId, RoundOutcome};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PlayerProfile {
    pub player_id: PlayerId,
    pub display_name: String,
    pub balance: Chips,
    pub wins: i64,
    pub losses: i64,
    pub games_played: i64,
}

impl PlayerProfile {
    pub fn new(player_id: PlayerId, display_name: &str, balance: Chips) -> Self {
        Self {
            player_id,
            display_name: display_name.to_string(),
            balance,
            wins: 0,
            losses: 0,
            games_played: 0,
        }
    }

    /// Wins and losses count once each; every outcome counts as a game.
    pub fn record(&mut self, outcome: RoundOutcome) {
        match outcome {
            RoundOutcome::Won => self.wins += 1,
            RoundOutcome::Lost => self.losses += 1,
            RoundOutcome::Push => {}
        }
        self.games_played += 1;
    }
}
