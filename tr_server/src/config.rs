//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use std::net::SocketAddr;
use table_reserve::{CoordinatorConfig, db::DatabaseConfig, waitlist::WaitlistConfig};

/// Default bind address
const DEFAULT_BIND: ([u8; 4], u16) = ([127, 0, 0, 1], 8080);

/// Which store backs the waitlist and table inventory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    #[default]
    Postgres,
    /// Process-local store, lost on restart
    Memory,
}

impl std::str::FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreKind::Postgres),
            "memory" | "in-memory" => Ok(StoreKind::Memory),
            other => Err(format!("Unknown store: {}", other)),
        }
    }
}

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Store backend
    pub store: StoreKind,
    /// Database configuration, used when `store` is Postgres
    pub database: DatabaseConfig,
    /// Waitlist queue configuration
    pub waitlist: WaitlistConfig,
    /// Assignment threshold
    pub coordinator: CoordinatorConfig,
    /// Capacity of the availability event broadcast
    pub event_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(DEFAULT_BIND),
            store: StoreKind::default(),
            database: DatabaseConfig::development(),
            waitlist: WaitlistConfig::default(),
            coordinator: CoordinatorConfig::default(),
            event_capacity: 1024,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    /// * `store_override` - Optional store backend override (from CLI args)
    ///
    /// # Returns
    ///
    /// * `Result<ServerConfig, ConfigError>` - Loaded configuration or error
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set but cannot be parsed
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
        store_override: Option<StoreKind>,
    ) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind = match bind_override {
            Some(bind) => bind,
            None => parse_env("SERVER_BIND")?.unwrap_or(defaults.bind),
        };

        let store = match store_override {
            Some(store) => store,
            None => parse_env("STORE")?.unwrap_or(defaults.store),
        };

        let mut database = DatabaseConfig::from_env();
        if let Some(url) = database_url_override {
            database.database_url = url;
        }

        let coordinator = CoordinatorConfig {
            min_acceptable_score: parse_env("MIN_ACCEPTABLE_SCORE")?
                .unwrap_or(defaults.coordinator.min_acceptable_score),
        };

        Ok(ServerConfig {
            bind,
            store,
            database,
            waitlist: WaitlistConfig::from_env(),
            coordinator,
            event_capacity: parse_env("EVENT_CHANNEL_CAPACITY")?.unwrap_or(defaults.event_capacity),
        })
    }

    /// Validate configuration after loading
    ///
    /// # Returns
    ///
    /// * `Result<(), ConfigError>` - Success or validation error
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store == StoreKind::Postgres {
            self.database.validate().map_err(|reason| ConfigError::Invalid {
                var: "DATABASE_URL".to_string(),
                reason,
            })?;
        }

        self.waitlist.validate().map_err(|reason| ConfigError::Invalid {
            var: "WAITLIST_*".to_string(),
            reason,
        })?;

        if !(0.0..=100.0).contains(&self.coordinator.min_acceptable_score) {
            return Err(ConfigError::Invalid {
                var: "MIN_ACCEPTABLE_SCORE".to_string(),
                reason: "Must be between 0 and 100".to_string(),
            });
        }

        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid {
                var: "EVENT_CHANNEL_CAPACITY".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Parse an optional environment variable. Unset is `None`; set but
/// unparseable is an error.
fn parse_env<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value.parse().map(Some).map_err(|e: T::Err| ConfigError::Invalid {
            var: key.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(None),
    }
}
