//! Database connection settings.

use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

impl DatabaseConfig {
    /// Reads the pool settings from the environment.
    ///
    /// - `DATABASE_URL`: PostgreSQL connection string. `None` when unset.
    /// - `DB_MAX_CONNECTIONS`: maximum pool size (default: 10)
    /// - `DB_MIN_CONNECTIONS`: minimum pool size (default: 1)
    /// - `DB_CONNECTION_TIMEOUT`: seconds to wait for a connection (default: 10)
    /// - `DB_IDLE_TIMEOUT`: seconds before an idle connection closes (default: 600)
    ///
    /// Unparseable numbers fall back to their defaults.
    pub fn from_env() -> Option<Self> {
        let database_url = env::var("DATABASE_URL").ok()?;
        let defaults = Self::development();
        Some(Self {
            database_url,
            max_connections: env_or("DB_MAX_CONNECTIONS", defaults.max_connections),
            min_connections: env_or("DB_MIN_CONNECTIONS", defaults.min_connections),
            connection_timeout_secs: env_or(
                "DB_CONNECTION_TIMEOUT",
                defaults.connection_timeout_secs,
            ),
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT", defaults.idle_timeout_secs),
        })
    }

    /// Local development defaults against `postgres://postgres@localhost/blackjack`.
    pub fn development() -> Self {
        Self {
            database_url: "postgres://postgres@localhost/blackjack".to_string(),
            max_connections: 10,
            min_connections: 1,
            connection_timeout_secs: 10,
            idle_timeout_secs: 600,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::development()
    }
}
