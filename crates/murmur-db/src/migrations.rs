//! Embedded schema migrations.
//!
//! Each migration is a SQL file compiled into the binary. Applied names are
//! recorded in `_murmur_migrations`; a migration and its tracking row commit
//! in the same transaction, so a failure leaves no partial schema behind.

use rusqlite::{Connection, OptionalExtension};
use thiserror::Error;

struct Migration {
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "000_sessions",
        sql: include_str!("migrations/000_sessions.sql"),
    },
    Migration {
        name: "001_accounts",
        sql: include_str!("migrations/001_accounts.sql"),
    },
    Migration {
        name: "002_todos",
        sql: include_str!("migrations/002_todos.sql"),
    },
    Migration {
        name: "003_learning",
        sql: include_str!("migrations/003_learning.sql"),
    },
];

const TRACKING_TABLE: &str = "CREATE TABLE IF NOT EXISTS _murmur_migrations (
    name TEXT PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);";

/// Errors raised while bringing the schema up to date.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A migration (or its bookkeeping) failed and was rolled back.
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        name: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The tracking table could not be created or read.
    #[error("failed to read migration state: {0}")]
    StateQuery(#[source] rusqlite::Error),
}

/// Applies every pending migration in order and returns how many ran.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    apply_pending(conn, MIGRATIONS)
}

fn is_applied(conn: &Connection, name: &str) -> Result<bool, MigrationError> {
    conn.query_row(
        "SELECT 1 FROM _murmur_migrations WHERE name = ?1",
        [name],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .map_err(MigrationError::StateQuery)
}

fn apply_one(conn: &Connection, migration: &Migration) -> rusqlite::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(migration.sql)?;
    tx.execute(
        "INSERT INTO _murmur_migrations (name) VALUES (?1)",
        [migration.name],
    )?;
    tx.commit()
}

fn apply_pending(conn: &Connection, migrations: &[Migration]) -> Result<usize, MigrationError> {
    conn.execute_batch(TRACKING_TABLE)
        .map_err(MigrationError::StateQuery)?;

    let mut applied = 0;
    for migration in migrations {
        if is_applied(conn, migration.name)? {
            tracing::debug!(migration = migration.name, "already applied");
            continue;
        }

        apply_one(conn, migration).map_err(|source| MigrationError::ExecutionFailed {
            name: migration.name.to_string(),
            source,
        })?;
        tracing::info!(migration = migration.name, "migration applied");
        applied += 1;
    }

    Ok(applied)
}
