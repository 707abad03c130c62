//! Connection pool creation and configuration.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use std::fmt;
use thiserror::Error;

/// Database credentials, read once at process start.
///
/// The SQLite backend opens `name` as the database file. `host`, `user` and
/// `password` are carried for deployments that resolve the database through
/// a network proxy and are not interpreted by the driver.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct DbCredentials {
    /// Database host.
    pub host: String,
    /// Database user.
    pub user: String,
    /// Database password.
    pub password: String,
    /// Database name (the SQLite file path).
    pub name: String,
}

impl fmt::Debug for DbCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbCredentials")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .finish()
    }
}

/// Runtime tunables for SQLite connection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// Busy timeout for SQLite connections, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

/// A type alias for the SQLite connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Errors that can occur when creating the database pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Failed to build the connection pool.
    #[error("failed to create database connection pool: {0}")]
    PoolInit(#[from] r2d2::Error),

    /// No database name was configured.
    #[error("database name is empty")]
    MissingDatabaseName,
}

/// Creates a new SQLite connection pool for the given credentials.
///
/// Every connection is opened in WAL mode with the configured busy timeout.
/// Acquiring a connection is `pool.get()`; dropping the guard releases it.
///
/// # Errors
///
/// Returns `PoolError::MissingDatabaseName` if `credentials.name` is empty,
/// and `PoolError::PoolInit` if the initial connections cannot be opened.
pub fn create_pool(
    credentials: &DbCredentials,
    settings: DbRuntimeSettings,
) -> Result<DbPool, PoolError> {
    // SQLite opens a separate temporary database per connection for "".
    if credentials.name.is_empty() {
        return Err(PoolError::MissingDatabaseName);
    }

    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;

    tracing::debug!(
        host = %credentials.host,
        user = %credentials.user,
        database = %credentials.name,
        "creating database pool"
    );

    let manager = SqliteConnectionManager::file(&credentials.name)
        .with_flags(flags)
        .with_init(move |conn| {
            // In-memory and temporary databases report "memory" or "delete".
            let journal_mode: String =
                conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
            if journal_mode != "wal" {
                tracing::debug!(journal_mode = %journal_mode, "WAL mode not available");
            }
            conn.execute_batch(&format!(
                "PRAGMA busy_timeout = {};",
                settings.busy_timeout_ms
            ))
        });

    let pool = Pool::builder()
        .max_size(settings.pool_max_size)
        .build(manager)?;

    Ok(pool)
}
