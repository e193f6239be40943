//! Outcomes of writes whose failure must not fail the request.

use std::fmt::Display;

/// Result of a secondary write (counter bump, tool-cache refresh, session
/// persistence after the provider already answered). Failures are logged
/// once, here, and then only inspected, never propagated.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum BestEffort<T> {
    Done(T),
    Failed(String),
}

impl<T> BestEffort<T> {
    pub fn from_result<E: Display>(what: &'static str, result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Done(value),
            Err(e) => {
                tracing::warn!(operation = what, error = %e, "best-effort write failed");
                Self::Failed(e.to_string())
            }
        }
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Self::Done(value) => Some(value),
            Self::Failed(_) => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }
}
