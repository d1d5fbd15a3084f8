//! Multi-room blackjack server using the room actor model.
//!
//! Rooms are spawned on demand by the `RoomRegistry`; player profiles live in
//! PostgreSQL when `DATABASE_URL` is set and in memory otherwise.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Error;
use bj_server::{api, config::ServerConfig, logging, metrics};
use blackjack::{
    RoomRegistry,
    db::{Database, InMemoryProfileRepository, PgProfileRepository, ProfileRepository},
};
use log::{info, warn};
use pico_args::Arguments;

const HELP: &str = "\
Run a multi-room blackjack server

USAGE:
  bj_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:6969]
  --db-url     URL         Database connection string  [default: env DATABASE_URL, in-memory if unset]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL             PostgreSQL connection string
  REQUIRE_DATABASE         Refuse to start without DATABASE_URL
  METRICS_BIND             Prometheus exporter address (e.g., 0.0.0.0:9090)
  ROOM_MIN_BET, ROOM_MAX_BET, ROOM_NUM_DECKS, ROOM_MAX_PLAYERS, STARTING_BALANCE
  DEALER_DELAY_MS, NEXT_ROUND_DELAY_MS, TURN_TIMEOUT_MS, BETTING_TIMEOUT_MS
  RUST_LOG                 Log filter (default: info)
  (See .env file for all configuration options)
";

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
    };

    logging::init();

    let config = ServerConfig::from_env(args.bind, args.database_url)?;
    config.validate()?;

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(|e| anyhow::anyhow!(e))?;
        info!("Prometheus metrics exported on http://{addr}/metrics");
    }

    let (repository, database): (Arc<dyn ProfileRepository>, Option<Database>) =
        match &config.database {
            Some(db_config) => {
                info!("Connecting to database");
                let db = Database::new(db_config)
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
                info!("Database connected successfully");
                (Arc::new(PgProfileRepository::new(db.pool().clone())), Some(db))
            }
            None => {
                warn!("DATABASE_URL not set; player profiles are kept in memory");
                (Arc::new(InMemoryProfileRepository::new()), None)
            }
        };

    info!(
        "Rooms: {} deck(s), bets {}-{}, {} seats, starting balance {}",
        config.room.num_decks,
        config.room.min_bet,
        config.room.max_bet,
        config.room.max_players,
        config.room.starting_balance
    );
    let registry = Arc::new(RoomRegistry::new(config.room.clone(), repository));

    let app = api::create_router(api::AppState {
        registry,
        database: database.clone(),
    });

    info!("Starting HTTP/WebSocket server on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", config.bind, e))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Shutting down server...");
    if let Some(db) = database {
        db.close().await;
    }

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to install CTRL+C signal handler: {e}");
        std::future::pending::<()>().await;
    }
}
