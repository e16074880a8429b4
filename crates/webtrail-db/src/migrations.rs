//! Schema migrations for the event database.
//!
//! Each migration is a SQL file compiled into the binary and applied at most
//! once. Applied names are recorded in `_webtrail_migrations`, which
//! `000_init` creates.

use std::collections::HashSet;

use rusqlite::Connection;
use thiserror::Error;

struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// Every migration, oldest first. Append only.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "000_init",
        sql: include_str!("migrations/000_init.sql"),
    },
    Migration {
        name: "001_events",
        sql: include_str!("migrations/001_events.sql"),
    },
];

/// Errors raised while bringing the schema up to date.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The bookkeeping table could not be created or read.
    #[error("failed to read applied migrations: {0}")]
    State(#[source] rusqlite::Error),

    /// A migration failed and was rolled back.
    #[error("migration '{name}' failed: {source}")]
    Failed {
        name: &'static str,
        #[source]
        source: rusqlite::Error,
    },
}

/// Applies every pending migration and returns how many ran.
///
/// # Errors
///
/// Stops at the first failing migration. Its changes are rolled back, the
/// ones before it stay applied.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    apply(conn, MIGRATIONS)
}

fn apply(conn: &Connection, migrations: &[Migration]) -> Result<usize, MigrationError> {
    let Some(bootstrap) = migrations.first() else {
        return Ok(0);
    };
    // The first migration only creates the bookkeeping table and is safe
    // to replay, so it runs before the applied set is read.
    conn.execute_batch(bootstrap.sql).map_err(MigrationError::State)?;
    let done = applied_names(conn)?;

    let mut count = 0;
    for migration in migrations.iter().filter(|m| !done.contains(m.name)) {
        tracing::info!(migration = migration.name, "applying migration");
        apply_one(conn, migration).map_err(|source| MigrationError::Failed {
            name: migration.name,
            source,
        })?;
        count += 1;
    }
    if count == 0 {
        tracing::debug!("event database schema is up to date");
    }
    Ok(count)
}

fn applied_names(conn: &Connection) -> Result<HashSet<String>, MigrationError> {
    let mut stmt = conn
        .prepare("SELECT name FROM _webtrail_migrations")
        .map_err(MigrationError::State)?;
    let names = stmt
        .query_map([], |row| row.get(0))
        .map_err(MigrationError::State)?
        .collect::<Result<HashSet<String>, _>>()
        .map_err(MigrationError::State)?;
    Ok(names)
}

fn apply_one(conn: &Connection, migration: &Migration) -> rusqlite::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(migration.sql)?;
    tx.execute(
        "INSERT INTO _webtrail_migrations (name) VALUES (?1)",
        [migration.name],
    )?;
    tx.commit()
}
