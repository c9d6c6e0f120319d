//! Structured logging configuration.
//!
//! The library crate logs through the `log` facade; those records are
//! bridged into `tracing` when the subscriber is installed.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,sqlx=warn,hyper=warn";

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` environment variable.
///
/// # Example
///
/// ```no_run
/// use tr_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log an operator action on a waitlist entry with structured fields
pub fn log_waitlist_transition(entry_id: uuid::Uuid, action: &str, status: &str) {
    tracing::info!(
        entry_id = %entry_id,
        action = action,
        status = status,
        "Waitlist transition"
    );
}
