//! Profile repository trait and its implementations.

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{
    errors::{ProfileError, ProfileResult},
    models::PlayerProfile,
};
use crate::game::entities::{Chips, PlayerId, RoundOutcome};

/// Where player balances and win/loss stats live between sessions.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn fetch_profile(&self, player_id: &PlayerId) -> ProfileResult<Option<PlayerProfile>>;

    /// Creates a profile, or returns the existing one untouched.
    async fn create_profile(
        &self,
        player_id: &PlayerId,
        display_name: &str,
        balance: Chips,
    ) -> ProfileResult<PlayerProfile>;

    /// Adds `delta` to the stored balance and returns the new balance.
    async fn apply_balance_delta(&self, player_id: &PlayerId, delta: Chips) -> ProfileResult<Chips>;

    async fn record_round_outcome(
        &self,
        player_id: &PlayerId,
        outcome: RoundOutcome,
    ) -> ProfileResult<()>;
}

/// PostgreSQL-backed profiles. Expects the `players` table from
/// `migrations/001_create_players.sql`.
#[derive(Clone)]
pub struct PgProfileRepository {
    pool: PgPool,
}

impl PgProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn profile_from_row(row: &PgRow) -> PlayerProfile {
    PlayerProfile {
        player_id: PlayerId::new(row.get::<String, _>("player_id").as_str()),
        display_name: row.get("display_name"),
        balance: row.get("balance"),
        wins: row.get("wins"),
        losses: row.get("losses"),
        games_played: row.get("games_played"),
    }
}

#[async_trait]
impl ProfileRepository for PgProfileRepository {
    async fn fetch_profile(&self, player_id: &PlayerId) -> ProfileResult<Option<PlayerProfile>> {
        let row = sqlx::query(
            "SELECT player_id, display_name, balance, wins, losses, games_played
             FROM players WHERE player_id = $1",
        )
        .bind(player_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(profile_from_row))
    }

    async fn create_profile(
        &self,
        player_id: &PlayerId,
        display_name: &str,
        balance: Chips,
    ) -> ProfileResult<PlayerProfile> {
        sqlx::query(
            "INSERT INTO players (player_id, display_name, balance)
             VALUES ($1, $2, $3)
             ON CONFLICT (player_id) DO NOTHING",
        )
        .bind(player_id.as_str())
        .bind(display_name)
        .bind(balance)
        .execute(&self.pool)
        .await?;

        self.fetch_profile(player_id)
            .await?
            .ok_or_else(|| ProfileError::PlayerNotFound(player_id.clone()))
    }

    async fn apply_balance_delta(&self, player_id: &PlayerId, delta: Chips) -> ProfileResult<Chips> {
        let row = sqlx::query(
            "UPDATE players SET balance = balance + $1, updated_at = NOW()
             WHERE player_id = $2
             RETURNING balance",
        )
        .bind(delta)
        .bind(player_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row.get("balance"))
            .ok_or_else(|| ProfileError::PlayerNotFound(player_id.clone()))
    }

    async fn record_round_outcome(
        &self,
        player_id: &PlayerId,
        outcome: RoundOutcome,
    ) -> ProfileResult<()> {
        let (wins, losses): (i64, i64) = match outcome {
            RoundOutcome::Won => (1, 0),
            RoundOutcome::Lost => (0, 1),
            RoundOutcome::Push => (0, 0),
        };
        let result = sqlx::query(
            "UPDATE players
             SET wins = wins + $1, losses = losses + $2, games_played = games_played + 1,
                 updated_at = NOW()
             WHERE player_id = $3",
        )
        .bind(wins)
        .bind(losses)
        .bind(player_id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ProfileError::PlayerNotFound(player_id.clone()));
        }
        Ok(())
    }
}

/// Profiles kept in process memory. Lost on restart.
#[derive(Default)]
pub struct InMemoryProfileRepository {
    profiles: RwLock<HashMap<PlayerId, PlayerProfile>>,
}

impl InMemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(profiles: impl IntoIterator<Item = PlayerProfile>) -> Self {
        let profiles = profiles
            .into_iter()
            .map(|profile| (profile.player_id.clone(), profile))
            .collect();
        Self {
            profiles: RwLock::new(profiles),
        }
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn fetch_profile(&self, player_id: &PlayerId) -> ProfileResult<Option<PlayerProfile>> {
        Ok(self.profiles.read().await.get(player_id).cloned())
    }

    async fn create_profile(
        &self,
        player_id: &PlayerId,
        display_name: &str,
        balance: Chips,
    ) -> ProfileResult<PlayerProfile> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .entry(player_id.clone())
            .or_insert_with(|| PlayerProfile::new(player_id.clone(), display_name, balance));
        Ok(profile.clone())
    }

    async fn apply_balance_delta(&self, player_id: &PlayerId, delta: Chips) -> ProfileResult<Chips> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .get_mut(player_id)
            .ok_or_else(|| ProfileError::PlayerNotFound(player_id.clone()))?;
        profile.balance += delta;
        Ok(profile.balance)
    }

    async fn record_round_outcome(
        &self,
        player_id: &PlayerId,
        outcome: RoundOutcome,
    ) -> ProfileResult<()> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .get_mut(player_id)
            .ok_or_else(|| ProfileError::PlayerNotFound(player_id.clone()))?;
        profile.record(outcome);
        Ok(())
    }
}
