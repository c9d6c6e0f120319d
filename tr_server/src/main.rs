//! Reservation server binary.
//!
//! Wires the waitlist, table inventory and availability board over either
//! PostgreSQL or the in-memory store, then serves the HTTP/WebSocket API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Error};
use pico_args::Arguments;
use table_reserve::{
    db::{Database, InMemoryTableRepository, InMemoryWaitlistRepository, TableRepository, WaitlistRepository},
    notify::LogDispatcher,
    waitlist::spawn_sweeper,
};
use tr_server::{
    api::{self, AppState},
    config::{ServerConfig, StoreKind},
    logging,
};

const HELP: &str = "\
Run the reservation availability and waitlist server

USAGE:
  tr_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]
  --store      KIND        postgres or memory          [default: env STORE or postgres]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL             PostgreSQL connection string
  STORE                    Store backend
  MIN_ACCEPTABLE_SCORE     Lowest assignment score that avoids the waitlist
  WAITLIST_*               Waitlist tuning (notification window, sweep interval)
  RUST_LOG                 Log filter
";

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
    store: Option<StoreKind>,
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
        store: pargs.opt_value_from_str("--store")?,
    };

    logging::init();

    let config = ServerConfig::from_env(args.bind, args.database_url, args.store)?;
    config.validate()?;

    tracing::info!(bind = %config.bind, store = ?config.store, "Starting reservation server");

    let (waitlist_repo, table_repo, database): (
        Arc<dyn WaitlistRepository>,
        Arc<dyn TableRepository>,
        Option<Database>,
    ) = match config.store {
        StoreKind::Postgres => {
            let db = Database::new(&config.database)
                .await
                .context("Failed to connect to database")?;
            db.migrate().await.context("Failed to run migrations")?;
            tracing::info!("Database connected and migrated");
            (
                Arc::new(db.waitlist_repository()),
                Arc::new(db.table_repository()),
                Some(db),
            )
        }
        StoreKind::Memory => {
            tracing::warn!("Using in-memory store; state is lost on restart");
            (
                Arc::new(InMemoryWaitlistRepository::new()),
                Arc::new(InMemoryTableRepository::new()),
                None,
            )
        }
    };

    let mut state = AppState::new(waitlist_repo, table_repo, Arc::new(LogDispatcher), &config);
    if let Some(db) = database.clone() {
        state = state.with_database(db);
    }

    let sweeper = spawn_sweeper(state.coordinator.clone(), config.waitlist.sweep_interval());
    let coordinator = tokio::spawn(state.coordinator.clone().run(state.board.subscribe()));

    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    tracing::info!("Server is running at http://{}. Press Ctrl+C to stop.", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shutting down server...");

    sweeper.abort();
    coordinator.abort();
    if let Some(db) = database {
        db.close().await;
    }

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
