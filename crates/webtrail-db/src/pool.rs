//! Connection pool for the event database.

use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

use crate::migrations::{run_migrations, MigrationError};

/// Runtime tunables for SQLite connection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// How long a connection waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections. One is held by the
    /// writer for the whole run.
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 4,
        }
    }
}

/// Pool of connections to one event database.
pub type DbPool = Pool<SqliteConnectionManager>;

/// A connection checked out of [`DbPool`].
pub type PooledConn = PooledConnection<SqliteConnectionManager>;

/// Errors raised while opening the event database.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool could not be built or handed out no connection.
    #[error("event database pool failed: {0}")]
    Pool(#[from] r2d2::Error),

    /// The schema could not be brought up to date.
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

/// Creates a pool over the SQLite file at `db_path`.
///
/// Every connection runs in WAL mode, so cursors can read while the writer
/// holds its run-long transaction. Each pooled connection to `:memory:` gets
/// a private database, so callers that read back what they wrote need a file.
///
/// # Errors
///
/// Returns [`PoolError::Pool`] if the first connection cannot be opened or
/// configured.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_init(move |conn| configure(conn, settings));

    let pool = Pool::builder()
        .max_size(settings.pool_max_size)
        .build(manager)?;
    tracing::debug!(path = db_path, max_size = settings.pool_max_size, "created event database pool");
    Ok(pool)
}

/// Creates a pool and applies pending migrations.
pub fn open_database(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    let pool = create_pool(db_path, settings)?;
    let conn = pool.get()?;
    let applied = run_migrations(&conn)?;
    drop(conn);
    if applied > 0 {
        tracing::info!(path = db_path, applied, "event database migrated");
    }
    Ok(pool)
}

fn configure(conn: &mut Connection, settings: DbRuntimeSettings) -> rusqlite::Result<()> {
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") && mode != "memory" {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!("journal_mode stayed {mode}, WAL is required")),
        ));
    }
    // Commits happen at test boundaries; NORMAL is durable enough in WAL.
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.busy_timeout(Duration::from_millis(settings.busy_timeout_ms))
}
