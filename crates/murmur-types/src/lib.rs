//! Shared types, error definitions, and constants for the Murmur assistant.
//!
//! This crate provides the foundational types used across all Murmur crates:
//! conversation modes, session lifecycle states, tool authorization tiers,
//! tool definitions as exposed to the speech model, and the model
//! configuration used when minting a conversation session.
//!
//! No crate in the workspace depends on anything *except* `murmur-types` for
//! cross-cutting type definitions. This keeps the dependency graph clean and
//! prevents circular dependencies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

mod tool;
pub mod voice;

pub use tool::{ParameterSchema, PropertySchema, ToolDefinition, ToolKind};
pub use voice::ModelConfig;

/// The active domain context of a conversation.
///
/// A session starts in [`Mode::None`] and moves between modes when the model
/// calls the `set_mode` meta tool. The mode decides which domain tools are
/// exposed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// No domain selected; only meta tools are exposed.
    #[default]
    None,
    /// Mail reading and writing.
    Email,
    /// Calendar events.
    Calendar,
    /// Todo list management.
    Todo,
    /// Learning-topic tracking.
    Learning,
    /// Casual conversation without domain tools.
    Relax,
}

impl Mode {
    /// Every mode, in declaration order.
    pub const ALL: [Mode; 6] = [
        Mode::None,
        Mode::Email,
        Mode::Calendar,
        Mode::Todo,
        Mode::Learning,
        Mode::Relax,
    ];

    /// Returns the wire label for this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Email => "email",
            Self::Calendar => "calendar",
            Self::Todo => "todo",
            Self::Learning => "learning",
            Self::Relax => "relax",
        }
    }

    /// Returns the tool domain backing this mode, or `None` for [`Mode::None`].
    pub fn domain(self) -> Option<Domain> {
        match self {
            Self::None => None,
            Self::Email => Some(Domain::Email),
            Self::Calendar => Some(Domain::Calendar),
            Self::Todo => Some(Domain::Todo),
            Self::Learning => Some(Domain::Learning),
            Self::Relax => Some(Domain::Relax),
        }
    }

    /// Whether tools of this mode act on a selected external account.
    pub fn is_account_scoped(self) -> bool {
        matches!(self, Self::Email | Self::Calendar)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a known value of an enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseEnumError {
    /// What was being parsed (e.g. "mode").
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl FromStr for Mode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str() == normalized)
            .ok_or_else(|| ParseEnumError {
                kind: "mode",
                value: s.to_string(),
            })
    }
}

/// Tool domain keys in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Email,
    Calendar,
    Todo,
    Learning,
    Relax,
}

impl Domain {
    /// Returns the wire label for this domain.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Calendar => "calendar",
            Self::Todo => "todo",
            Self::Learning => "learning",
            Self::Relax => "relax",
        }
    }
}

/// Lifecycle status of a conversation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// The conversation is live.
    #[default]
    Active,
    /// The conversation ended normally.
    Completed,
    /// The conversation ended with an error.
    Failed,
    /// The provider session expired.
    Expired,
}

impl SessionStatus {
    /// Returns the stored label for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }

    /// Terminal sessions are never mutated again, only deleted.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "expired" => Ok(Self::Expired),
            other => Err(ParseEnumError {
                kind: "session status",
                value: other.to_string(),
            }),
        }
    }
}

/// Identity requirement of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthTier {
    /// Works for anyone.
    Public,
    /// Works anonymously, richer with a verified identity.
    SoftAuth,
    /// Requires a verified identity.
    HardAuth,
}

impl AuthTier {
    /// Whether a caller with (`true`) or without (`false`) a verified
    /// identity may invoke a tool of this tier.
    pub fn permits(self, authenticated: bool) -> bool {
        match self {
            Self::Public | Self::SoftAuth => true,
            Self::HardAuth => authenticated,
        }
    }
}
