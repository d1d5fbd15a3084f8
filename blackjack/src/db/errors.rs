//! Profile persistence errors.

use std::time::Duration;
use thiserror::Error;

use crate::game::entities::PlayerId;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Profile not found for player {0}")]
    PlayerNotFound(PlayerId),

    #[error("Profile operation timed out after {0:?}")]
    Timeout(Duration),
}

impl ProfileError {
    /// Message safe to hand to a client. Database details stay server-side.
    pub fn client_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Timeout(_) => "Internal server error".to_string(),
            Self::PlayerNotFound(_) => "Profile not found".to_string(),
        }
    }
}

pub type ProfileResult<T> = Result<T, ProfileError>;
