//! Database layer for the webtrail event store.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization
//! and the embedded migrations that create the `events` table.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: a test run writes through a single connection
//!   while report generation reads through others. WAL lets the readers
//!   proceed without waiting for the writer's open transaction.
//! - **`r2d2` connection pool**: the event store borrows one connection for
//!   the lifetime of a run and hands out short-lived ones for read-back.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!`, so the schema cannot drift from the code that uses it.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, open_database, DbPool, DbRuntimeSettings, PoolError, PooledConn};
