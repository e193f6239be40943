//! Database layer for the Murmur assistant.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! embedded SQL migrations, and timestamp helpers shared by every store
//! crate. Every table (sessions, transcripts, connected accounts, todos,
//! learning topics) is created through versioned migrations managed here.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: concurrent readers with a single writer,
//!   which matches the one-tool-call-at-a-time access pattern per session.
//! - **Per-row atomic updates**: stores never hold application locks; they
//!   rely on single-statement updates and version checks instead.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!` so the schema cannot drift from the code using it.

mod migrations;
mod pool;
mod time;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
pub use time::{format_timestamp, parse_timestamp};
