//! HTTP/WebSocket API for the reservation server.
//!
//! # Modules
//!
//! - [`availability`]: The availability board and its WebSocket push endpoint
//! - [`reservations`]: Table requests that either hold a table or join the waitlist
//! - [`tables`]: Table inventory and live table status
//! - [`waitlist`]: Waitlist queue operations
//!
//! # Endpoints Overview
//!
//! ```text
//! GET  /health                              - Health check
//! POST /api/v1/reservations                 - Request a table
//! POST /api/v1/reservations/release         - Release a tentative hold
//! POST /api/v1/reservation-events           - Publish a reservation event
//! POST /api/v1/availability                 - Publish a slot status change
//! GET  /api/v1/availability/{date}          - Snapshot of a date
//! GET  /api/v1/tables                       - List tables
//! POST /api/v1/tables                       - Create or replace a table
//! POST /api/v1/tables/{id}/status           - Set live table status
//! POST /api/v1/waitlist                     - Join the waitlist
//! GET  /api/v1/waitlist?id=&email=&phone=   - Find active entries
//! GET  /api/v1/waitlist/{id}                - Get one entry
//! POST /api/v1/waitlist/{id}/notify         - Offer a table
//! POST /api/v1/waitlist/{id}/confirm        - Accept an offer
//! POST /api/v1/waitlist/{id}/cancel         - Leave the waitlist
//! POST /api/v1/waitlist/{id}/expire         - Close an entry as expired
//! POST /api/v1/waitlist/recompute           - Recompute queue positions
//! GET  /ws/availability                     - Availability push channel
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively. In production, configure appropriate
//! origins, methods, and headers.

pub mod availability;
pub mod reservations;
pub mod tables;
pub mod waitlist;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use table_reserve::{
    CoordinatorError, ReservationCoordinator,
    db::{Database, StoreError, TableRepository, WaitlistRepository},
    notify::NotificationDispatcher,
    waitlist::{WaitlistError, WaitlistManager},
};
use tower_http::cors::CorsLayer;

pub use availability::AvailabilityBoard;

use crate::config::ServerConfig;

/// Application state shared across all HTTP handlers and WebSocket connections.
///
/// Cloned for each request; every field is reference counted.
#[derive(Clone)]
pub struct AppState {
    pub waitlist: Arc<WaitlistManager>,
    pub tables: Arc<dyn TableRepository>,
    pub coordinator: Arc<ReservationCoordinator>,
    pub board: AvailabilityBoard,
    /// Present when backed by PostgreSQL; checked by `/health`
    pub database: Option<Database>,
}

impl AppState {
    /// Wire the managers over the given stores
    ///
    /// # Arguments
    ///
    /// * `waitlist_repo` - Waitlist store
    /// * `table_repo` - Table inventory store
    /// * `dispatcher` - Guest notification sink
    /// * `config` - Server configuration
    pub fn new(
        waitlist_repo: Arc<dyn WaitlistRepository>,
        table_repo: Arc<dyn TableRepository>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        config: &ServerConfig,
    ) -> Self {
        let waitlist = Arc::new(WaitlistManager::new(
            waitlist_repo,
            dispatcher,
            config.waitlist.clone(),
        ));
        let board = AvailabilityBoard::new(config.event_capacity);
        let coordinator = Arc::new(ReservationCoordinator::new(
            table_repo.clone(),
            waitlist.clone(),
            board.cache(),
            config.coordinator,
        ));

        Self {
            waitlist,
            tables: table_repo,
            coordinator,
            board,
            database: None,
        }
    }

    /// Attach the database checked by `/health`
    pub fn with_database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }
}

/// Error body returned by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Handler error: status code plus JSON body
pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Handler result
pub type ApiResult<T> = Result<T, ApiError>;

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

impl From<WaitlistError> for ErrorResponse {
    fn from(err: WaitlistError) -> Self {
        Self {
            error: err.client_message(),
        }
    }
}

/// Map a waitlist error onto an HTTP status
pub(crate) fn waitlist_error(err: WaitlistError) -> ApiError {
    let status = match &err {
        WaitlistError::Validation(_) => StatusCode::BAD_REQUEST,
        WaitlistError::NotFound(_) => StatusCode::NOT_FOUND,
        WaitlistError::InvalidState { .. } => StatusCode::CONFLICT,
        WaitlistError::Store(e) => {
            tracing::error!(error = %e, "Waitlist store failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(err.into()))
}

pub(crate) fn store_error(err: StoreError) -> ApiError {
    tracing::error!(error = %err, "Store failure");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

pub(crate) fn coordinator_error(err: CoordinatorError) -> ApiError {
    match err {
        CoordinatorError::Validation(_) => {
            error_response(StatusCode::BAD_REQUEST, err.client_message())
        }
        CoordinatorError::Waitlist(e) => waitlist_error(e),
        CoordinatorError::Store(e) => store_error(e),
    }
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Example
///
/// ```rust,no_run
/// # use tr_server::api::{create_router, AppState};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let state: AppState = unimplemented!();
/// let app = create_router(state);
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```
pub fn create_router(state: AppState) -> Router {
    let root_routes = Router::new()
        .route("/health", get(health_check))
        .route("/ws/availability", get(availability::websocket_handler));

    Router::new()
        .merge(root_routes)
        .nest("/api/v1", create_v1_router())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/reservations", post(reservations::request_table))
        .route("/reservations/release", post(reservations::release_hold))
        .route("/reservation-events", post(availability::publish_reservation_event))
        .route("/availability", post(availability::publish_availability))
        .route("/availability/{date}", get(availability::get_snapshot))
        .route("/tables", get(tables::list_tables).post(tables::upsert_table))
        .route("/tables/{table_id}/status", post(tables::set_table_status))
        .route("/waitlist", get(waitlist::search).post(waitlist::enqueue))
        .route("/waitlist/recompute", post(waitlist::recompute))
        .route("/waitlist/{id}", get(waitlist::get_entry))
        .route("/waitlist/{id}/notify", post(waitlist::notify))
        .route("/waitlist/{id}/confirm", post(waitlist::confirm))
        .route("/waitlist/{id}/cancel", post(waitlist::cancel))
        .route("/waitlist/{id}/expire", post(waitlist::expire))
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when the database (if any) answers, `503 Service
/// Unavailable` otherwise.
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"healthy","database":true,"waitlist":{"pending":3},...}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = match &state.database {
        Some(db) => db.health_check().await.is_ok(),
        None => true,
    };

    let pending = state.waitlist.pending_entries().await.map(|e| e.len());
    let waitlist_healthy = pending.is_ok();

    let overall_healthy = db_healthy && waitlist_healthy;
    let status_code = if overall_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if overall_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_healthy,
        "store": if state.database.is_some() { "postgres" } else { "memory" },
        "waitlist": {
            "healthy": waitlist_healthy,
            "pending": pending.unwrap_or(0),
        },
        "subscribers": state.board.receiver_count(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
