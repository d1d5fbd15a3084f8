//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use blackjack::{RoomConfig, db::DatabaseConfig};
use std::net::SocketAddr;

const DEFAULT_BIND: &str = "127.0.0.1:6969";

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Database configuration. `None` keeps profiles in memory.
    pub database: Option<DatabaseConfig>,
    /// Rules and clocks for every room
    pub room: RoomConfig,
    /// Prometheus scrape address. `None` disables the exporter.
    pub metrics_bind: Option<SocketAddr>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if an address variable is set but cannot be parsed, or
    /// if `REQUIRE_DATABASE=true` and no database URL is given
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => parse_addr("SERVER_BIND")?
                .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 6969))),
        };

        let database = match database_url_override {
            Some(database_url) => Some(DatabaseConfig {
                database_url,
                ..DatabaseConfig::from_env().unwrap_or_default()
            }),
            None => DatabaseConfig::from_env(),
        };

        if database.is_none() && parse_env_or("REQUIRE_DATABASE", false) {
            return Err(ConfigError::MissingRequired {
                var: "DATABASE_URL".to_string(),
                hint: "Set it, or unset REQUIRE_DATABASE to keep profiles in memory".to_string(),
            });
        }

        let defaults = RoomConfig::default();
        let room = RoomConfig {
            num_decks: parse_env_or("ROOM_NUM_DECKS", defaults.num_decks),
            min_bet: parse_env_or("ROOM_MIN_BET", defaults.min_bet),
            max_bet: parse_env_or("ROOM_MAX_BET", defaults.max_bet),
            max_players: parse_env_or("ROOM_MAX_PLAYERS", defaults.max_players),
            starting_balance: parse_env_or("STARTING_BALANCE", defaults.starting_balance),
            dealer_delay_ms: parse_env_or("DEALER_DELAY_MS", defaults.dealer_delay_ms),
            next_round_delay_ms: parse_env_or("NEXT_ROUND_DELAY_MS", defaults.next_round_delay_ms),
            turn_timeout_ms: parse_env_or("TURN_TIMEOUT_MS", defaults.turn_timeout_ms),
            betting_timeout_ms: parse_env_or("BETTING_TIMEOUT_MS", defaults.betting_timeout_ms),
            inbox_capacity: parse_env_or("ROOM_INBOX_CAPACITY", defaults.inbox_capacity),
        };

        let metrics_bind = parse_addr("METRICS_BIND")?;

        Ok(ServerConfig {
            bind,
            database,
            room,
            metrics_bind,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.room.validate().map_err(|reason| ConfigError::Invalid {
            var: "ROOM_*".to_string(),
            reason,
        })?;

        if self.room.starting_balance < self.room.min_bet {
            return Err(ConfigError::Invalid {
                var: "STARTING_BALANCE".to_string(),
                reason: format!("Must cover the minimum bet ({})", self.room.min_bet),
            });
        }

        if let Some(database) = &self.database
            && database.max_connections < database.min_connections
        {
            return Err(ConfigError::Invalid {
                var: "DB_MAX_CONNECTIONS".to_string(),
                reason: format!(
                    "Must be at least DB_MIN_CONNECTIONS ({})",
                    database.min_connections
                ),
            });
        }

        if self.metrics_bind == Some(self.bind) {
            return Err(ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: "Must differ from the server bind address".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 6969)),
            database: None,
            room: RoomConfig::default(),
            metrics_bind: None,
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// A socket address variable. Unset is fine, garbage is not.
fn parse_addr(key: &str) -> Result<Option<SocketAddr>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value.parse().map(Some).map_err(|_| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("'{value}' is not an IP:PORT address (e.g. {DEFAULT_BIND})"),
        }),
        Err(_) => Ok(None),
    }
}
