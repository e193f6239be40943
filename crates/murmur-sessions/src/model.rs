use crate::SessionError;
use murmur_types::{Mode, SessionStatus};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// A live or historical conversation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Internal id (UUID).
    pub id: String,
    /// Id issued by the conversation provider. Never changes.
    pub provider_session_id: String,
    /// Owning user; `None` for anonymous sessions.
    pub user_id: Option<String>,
    pub mode: Mode,
    /// Email of the external account tools act on.
    pub selected_account: Option<String>,
    /// Names of the tools currently exposed to the model, in catalog order.
    pub active_tools: Vec<String>,
    pub status: SessionStatus,
    pub model: String,
    pub voice: String,
    pub error_message: Option<String>,
    pub duration_seconds: Option<i64>,
    pub total_messages: i64,
    pub tool_calls: i64,
    pub metadata: serde_json::Value,
    /// Optimistic concurrency counter, bumped by every committed write.
    pub version: i64,
    pub started_at: String,
    pub updated_at: String,
    pub ended_at: Option<String>,
}

/// Parameters for persisting a freshly minted session.
#[derive(Debug, Clone, Default)]
pub struct NewSession {
    pub provider_session_id: String,
    pub user_id: Option<String>,
    pub model: String,
    pub voice: String,
    pub active_tools: Vec<String>,
    pub metadata: serde_json::Value,
}

pub(crate) const SESSION_COLUMNS: &str = "id, provider_session_id, user_id, mode, selected_account,
    active_tools_json, status, model, voice, error_message, duration_seconds,
    total_messages, tool_calls, metadata_json, version, started_at, updated_at, ended_at";

/// Raw row as read from SQLite, before enum and JSON decoding.
pub(crate) struct SessionRow {
    id: String,
    provider_session_id: String,
    user_id: Option<String>,
    mode: String,
    selected_account: Option<String>,
    active_tools_json: String,
    status: String,
    model: String,
    voice: String,
    error_message: Option<String>,
    duration_seconds: Option<i64>,
    total_messages: i64,
    tool_calls: i64,
    metadata_json: String,
    version: i64,
    started_at: String,
    updated_at: String,
    ended_at: Option<String>,
}

pub(crate) fn map_row(row: &Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        id: row.get(0)?,
        provider_session_id: row.get(1)?,
        user_id: row.get(2)?,
        mode: row.get(3)?,
        selected_account: row.get(4)?,
        active_tools_json: row.get(5)?,
        status: row.get(6)?,
        model: row.get(7)?,
        voice: row.get(8)?,
        error_message: row.get(9)?,
        duration_seconds: row.get(10)?,
        total_messages: row.get(11)?,
        tool_calls: row.get(12)?,
        metadata_json: row.get(13)?,
        version: row.get(14)?,
        started_at: row.get(15)?,
        updated_at: row.get(16)?,
        ended_at: row.get(17)?,
    })
}

impl TryFrom<SessionRow> for Session {
    type Error = SessionError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let mode = row.mode.parse::<Mode>().map_err(|_| SessionError::Corrupt {
            field: "mode",
            value: row.mode.clone(),
        })?;
        let status = row
            .status
            .parse::<SessionStatus>()
            .map_err(|_| SessionError::Corrupt {
                field: "status",
                value: row.status.clone(),
            })?;

        Ok(Session {
            id: row.id,
            provider_session_id: row.provider_session_id,
            user_id: row.user_id,
            mode,
            selected_account: row.selected_account,
            active_tools: serde_json::from_str(&row.active_tools_json)?,
            status,
            model: row.model,
            voice: row.voice,
            error_message: row.error_message,
            duration_seconds: row.duration_seconds,
            total_messages: row.total_messages,
            tool_calls: row.tool_calls,
            metadata: serde_json::from_str(&row.metadata_json)?,
            version: row.version,
            started_at: row.started_at,
            updated_at: row.updated_at,
            ended_at: row.ended_at,
        })
    }
}

impl Session {
    /// Whether `user_id` (or anonymous, `None`) may see and act on this
    /// session. Anonymous sessions are open to anyone holding the reference;
    /// owned sessions only to their owner.
    pub fn is_visible_to(&self, user_id: Option<&str>) -> bool {
        match self.user_id.as_deref() {
            None => true,
            Some(owner) => user_id == Some(owner),
        }
    }

    /// Strict ownership: the caller (or anonymous) must equal the owner.
    pub fn is_owned_by(&self, user_id: Option<&str>) -> bool {
        self.user_id.as_deref() == user_id
    }
}
