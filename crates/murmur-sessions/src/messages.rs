//! Conversation transcript rows.

use crate::SessionError;
use chrono::Utc;
use murmur_db::format_timestamp;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Who produced a transcript entry and in what form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    UserText,
    UserAudio,
    AssistantText,
    AssistantAudio,
    System,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserText => "user_text",
            Self::UserAudio => "user_audio",
            Self::AssistantText => "assistant_text",
            Self::AssistantAudio => "assistant_audio",
            Self::System => "system",
        }
    }
}

impl FromStr for MessageType {
    type Err = murmur_types::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user_text" => Ok(Self::UserText),
            "user_audio" => Ok(Self::UserAudio),
            "assistant_text" => Ok(Self::AssistantText),
            "assistant_audio" => Ok(Self::AssistantAudio),
            "system" => Ok(Self::System),
            other => Err(murmur_types::ParseEnumError {
                kind: "message type",
                value: other.to_string(),
            }),
        }
    }
}

/// A stored transcript message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: String,
    pub session_id: String,
    pub message_type: MessageType,
    pub content: Option<String>,
    pub audio_duration_ms: Option<i64>,
    /// Client-side timestamp, milliseconds since the epoch.
    pub timestamp_ms: i64,
    pub metadata: serde_json::Value,
    pub created_at: String,
}

/// A transcript message to store.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMessage {
    pub message_type: MessageType,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub audio_duration_ms: Option<i64>,
    /// Defaults to the server clock when absent.
    #[serde(default)]
    pub timestamp_ms: Option<i64>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Stores a transcript row for an existing session.
///
/// Does not touch the session's message counter; callers follow up with a
/// `MessageRecorded` event.
pub fn record_message(
    conn: &Connection,
    session_id: &str,
    message: &NewMessage,
) -> Result<ConversationMessage, SessionError> {
    let now = Utc::now();
    let stored = ConversationMessage {
        id: uuid::Uuid::new_v4().to_string(),
        session_id: session_id.to_string(),
        message_type: message.message_type,
        content: message.content.clone(),
        audio_duration_ms: message.audio_duration_ms,
        timestamp_ms: message.timestamp_ms.unwrap_or_else(|| now.timestamp_millis()),
        metadata: message
            .metadata
            .clone()
            .unwrap_or_else(|| serde_json::json!({})),
        created_at: format_timestamp(now),
    };

    let inserted = conn.execute(
        "INSERT INTO conversation_messages (
            id, session_id, message_type, content, audio_duration_ms,
            timestamp_ms, metadata_json, created_at
        )
        SELECT ?1, id, ?3, ?4, ?5, ?6, ?7, ?8 FROM realtime_sessions WHERE id = ?2",
        params![
            stored.id,
            stored.session_id,
            stored.message_type.as_str(),
            stored.content,
            stored.audio_duration_ms,
            stored.timestamp_ms,
            serde_json::to_string(&stored.metadata)?,
            stored.created_at,
        ],
    )?;
    if inserted == 0 {
        return Err(SessionError::NotFound(session_id.to_string()));
    }
    Ok(stored)
}

fn map_row_to_message(row: &Row<'_>) -> rusqlite::Result<(ConversationMessage, String, String)> {
    Ok((
        ConversationMessage {
            id: row.get(0)?,
            session_id: row.get(1)?,
            message_type: MessageType::System,
            content: row.get(3)?,
            audio_duration_ms: row.get(4)?,
            timestamp_ms: row.get(5)?,
            metadata: serde_json::Value::Null,
            created_at: row.get(7)?,
        },
        row.get(2)?,
        row.get(6)?,
    ))
}

/// Lists a session's transcript in conversation order.
pub fn list_messages(
    conn: &Connection,
    session_id: &str,
) -> Result<Vec<ConversationMessage>, SessionError> {
    let mut stmt = conn.prepare(
        "SELECT id, session_id, message_type, content, audio_duration_ms,
                timestamp_ms, metadata_json, created_at
        FROM conversation_messages
        WHERE session_id = ?1
        ORDER BY timestamp_ms ASC, created_at ASC, rowid ASC",
    )?;
    let rows = stmt.query_map([session_id], map_row_to_message)?;

    let mut messages = Vec::new();
    for row in rows {
        let (mut message, kind, metadata_json) = row?;
        message.message_type = kind.parse().map_err(|_| SessionError::Corrupt {
            field: "message_type",
            value: kind.clone(),
        })?;
        message.metadata = serde_json::from_str(&metadata_json)?;
        messages.push(message);
    }
    Ok(messages)
}
