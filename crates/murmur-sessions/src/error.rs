//! Error types for the session store.

/// Errors that can occur while reading or mutating sessions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A database operation failed.
    #[error("session database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON encoding of a stored column failed.
    #[error("session serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No session matches the given reference.
    #[error("session not found: {0}")]
    NotFound(String),

    /// A session with this provider session id already exists.
    #[error("provider session id already registered: {0}")]
    Duplicate(String),

    /// Concurrent writers kept winning the version race.
    #[error("session {0} is being modified concurrently, retries exhausted")]
    Conflict(String),

    /// A stored column holds a value the current code does not understand.
    #[error("corrupt session row: {field} = '{value}'")]
    Corrupt { field: &'static str, value: String },
}
