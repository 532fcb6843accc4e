//! Database configuration.
//!
//! Configuration is built in code with the `DbConfig` builder, or loaded
//! from environment variables with fallback to defaults.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default database file used when `VENTAS_DB_PATH` is not set.
pub const DEFAULT_DB_PATH: &str = "./ventas.db";

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/ventas.db")
///     .max_connections(5)
///     .min_connections(1);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// How long to wait for a pooled connection.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a configuration for the given database file.
    ///
    /// The file is created on first connect if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
        }
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let db = Database::new(DbConfig::in_memory()).await?;
    /// // isolated, dropped with the pool
    /// ```
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            // Every connection to :memory: is its own database
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// | Variable                         | Default       |
    /// |----------------------------------|---------------|
    /// | `VENTAS_DB_PATH`                 | `./ventas.db` |
    /// | `VENTAS_DB_MAX_CONNECTIONS`      | `5`           |
    /// | `VENTAS_DB_MIN_CONNECTIONS`      | `1`           |
    /// | `VENTAS_DB_CONNECT_TIMEOUT_SECS` | `30`          |
    /// | `VENTAS_DB_RUN_MIGRATIONS`       | `true`        |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = DbConfig::new(DEFAULT_DB_PATH);

        let config = DbConfig {
            database_path: env::var("VENTAS_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),

            max_connections: parse_var("VENTAS_DB_MAX_CONNECTIONS")?
                .unwrap_or(defaults.max_connections),

            min_connections: parse_var("VENTAS_DB_MIN_CONNECTIONS")?
                .unwrap_or(defaults.min_connections),

            connect_timeout: parse_var("VENTAS_DB_CONNECT_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),

            idle_timeout: defaults.idle_timeout,

            run_migrations: parse_var("VENTAS_DB_RUN_MIGRATIONS")?
                .unwrap_or(defaults.run_migrations),
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "VENTAS_DB_MAX_CONNECTIONS".to_string(),
            ));
        }
        if config.min_connections > config.max_connections {
            return Err(ConfigError::InvalidValue(
                "VENTAS_DB_MIN_CONNECTIONS".to_string(),
            ));
        }

        Ok(config)
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidValue(name.to_string())),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

// =============================================================================
// Unit Tests
// =============================================================================
