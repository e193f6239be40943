//! Study sessions: resuming a topic and saving what was covered.

use crate::topics::{get_topic, validate_progress};
use crate::{Continuation, LearningError, LearningSession, LearningTopic, ProgressUpdate, SavedProgress, TopicStatus};
use chrono::{DateTime, Utc};
use murmur_db::{format_timestamp, parse_timestamp};
use rusqlite::{params, Connection, OptionalExtension, Row};

const SESSION_COLUMNS: &str = "id, topic_id, session_number, started_at, ended_at,
    duration_minutes, summary, concepts_json";

fn map_row_to_session(row: &Row<'_>) -> rusqlite::Result<LearningSession> {
    let concepts_json: String = row.get(7)?;
    Ok(LearningSession {
        id: row.get(0)?,
        topic_id: row.get(1)?,
        session_number: row.get(2)?,
        started_at: row.get(3)?,
        ended_at: row.get(4)?,
        duration_minutes: row.get(5)?,
        summary: row.get(6)?,
        concepts_covered: serde_json::from_str(&concepts_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?,
    })
}

/// Trims, drops empties, and removes case-insensitive duplicates while
/// keeping the first spelling.
fn dedupe(concepts: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for concept in concepts {
        let concept = concept.trim().to_string();
        let key = concept.to_lowercase();
        if concept.is_empty() || seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(concept);
    }
    out
}

/// Set-union of `existing` and `incoming`: existing order is kept and unseen
/// concepts are appended. Returns the merged list and the newly added ones.
pub fn merge_concepts(existing: &[String], incoming: &[String]) -> (Vec<String>, Vec<String>) {
    let merged = dedupe(existing.iter().chain(incoming.iter()).cloned());
    let added = merged[dedupe(existing.iter().cloned()).len()..].to_vec();
    (merged, added)
}

/// The latest study session of a topic that has not been closed yet.
fn open_session(conn: &Connection, topic_id: &str) -> Result<Option<LearningSession>, LearningError> {
    let sql = format!(
        "SELECT {SESSION_COLUMNS} FROM learning_sessions
        WHERE topic_id = ?1 AND ended_at IS NULL
        ORDER BY session_number DESC LIMIT 1"
    );
    Ok(conn.query_row(&sql, [topic_id], map_row_to_session).optional()?)
}

fn get_session(conn: &Connection, id: &str) -> Result<LearningSession, LearningError> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM learning_sessions WHERE id = ?1");
    conn.query_row(&sql, [id], map_row_to_session)
        .optional()?
        .ok_or_else(|| LearningError::NotFound(id.to_string()))
}

/// A topic's study sessions, newest first. Unknown topics, and topics of
/// other users, are reported as not found.
pub fn list_sessions(
    conn: &Connection,
    user_id: &str,
    topic_id: &str,
    limit: u32,
    offset: u32,
) -> Result<Vec<LearningSession>, LearningError> {
    get_topic(conn, user_id, topic_id)?;
    let sql = format!(
        "SELECT {SESSION_COLUMNS} FROM learning_sessions
        WHERE topic_id = ?1 AND user_id = ?2
        ORDER BY session_number DESC
        LIMIT ?3 OFFSET ?4"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![topic_id, user_id, limit, offset], map_row_to_session)?;
    let mut sessions = Vec::new();
    for row in rows {
        sessions.push(row?);
    }
    Ok(sessions)
}

/// Bumps the session counter and opens a study session with that number.
fn start_session(
    conn: &Connection,
    topic: &LearningTopic,
    now: DateTime<Utc>,
) -> Result<LearningSession, LearningError> {
    let now_str = format_timestamp(now);
    let status = match topic.status {
        TopicStatus::NotStarted | TopicStatus::Paused => TopicStatus::InProgress,
        other => other,
    };
    conn.execute(
        "UPDATE learning_topics SET
            session_count = session_count + 1,
            status = ?1,
            last_studied_at = ?2,
            updated_at = ?2
        WHERE id = ?3",
        params![status.as_str(), now_str, topic.id],
    )?;
    let number: i64 = conn.query_row(
        "SELECT session_count FROM learning_topics WHERE id = ?1",
        [&topic.id],
        |row| row.get(0),
    )?;

    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO learning_sessions (id, topic_id, user_id, session_number, started_at)
        VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, topic.id, topic.user_id, number, now_str],
    )?;
    get_session(conn, &id)
}

/// Resumes a topic: increments its session count, opens a new study session
/// with that number, and returns the topic (last summary, next steps,
/// progress, concepts) so the conversation can pick up where it left off.
pub fn continue_topic(
    conn: &Connection,
    user_id: &str,
    topic_id: &str,
) -> Result<Continuation, LearningError> {
    continue_topic_at(conn, user_id, topic_id, Utc::now())
}

pub(crate) fn continue_topic_at(
    conn: &Connection,
    user_id: &str,
    topic_id: &str,
    now: DateTime<Utc>,
) -> Result<Continuation, LearningError> {
    let tx = conn.unchecked_transaction()?;
    let topic = get_topic(&tx, user_id, topic_id)?;
    let session = start_session(&tx, &topic, now)?;
    let topic = get_topic(&tx, user_id, topic_id)?;
    tx.commit()?;

    tracing::info!(
        user_id,
        topic_id,
        session_number = session.session_number,
        "learning session started"
    );
    Ok(Continuation { topic, session })
}

/// Closes the current study session of a topic and folds it into the topic.
///
/// Concepts are merged as a set union, the session's duration is the whole
/// minutes since it started, and the topic's total time grows by that much.
/// A topic with no open session gets one opened and closed immediately.
pub fn save_progress(
    conn: &Connection,
    user_id: &str,
    topic_id: &str,
    update: &ProgressUpdate,
) -> Result<SavedProgress, LearningError> {
    save_progress_at(conn, user_id, topic_id, update, Utc::now())
}

pub(crate) fn save_progress_at(
    conn: &Connection,
    user_id: &str,
    topic_id: &str,
    update: &ProgressUpdate,
    now: DateTime<Utc>,
) -> Result<SavedProgress, LearningError> {
    let progress = update.progress_percentage.map(validate_progress).transpose()?;

    let tx = conn.unchecked_transaction()?;
    let topic = get_topic(&tx, user_id, topic_id)?;
    let session = match open_session(&tx, topic_id)? {
        Some(open) => open,
        None => start_session(&tx, &topic, now)?,
    };

    let duration = parse_timestamp(&session.started_at)
        .map(|started| (now - started).num_minutes().max(0))
        .unwrap_or(0);
    let session_concepts = dedupe(update.concepts.iter().cloned());
    let (merged, new_concepts) = merge_concepts(&topic.concepts_covered, &session_concepts);
    let now_str = format_timestamp(now);

    tx.execute(
        "UPDATE learning_sessions SET
            ended_at = ?1, duration_minutes = ?2, summary = ?3, concepts_json = ?4
        WHERE id = ?5",
        params![
            now_str,
            duration,
            update.summary,
            serde_json::to_string(&session_concepts)?,
            session.id,
        ],
    )?;

    let status = match progress {
        Some(100) => TopicStatus::Completed,
        _ if topic.status == TopicStatus::Completed => TopicStatus::Completed,
        _ => TopicStatus::InProgress,
    };
    tx.execute(
        "UPDATE learning_topics SET
            concepts_json = ?1,
            last_summary = COALESCE(?2, last_summary),
            next_steps = COALESCE(?3, next_steps),
            progress_percentage = COALESCE(?4, progress_percentage),
            total_time_minutes = total_time_minutes + ?5,
            status = ?6,
            last_studied_at = ?7,
            updated_at = ?7
        WHERE id = ?8",
        params![
            serde_json::to_string(&merged)?,
            update.summary,
            update.next_steps,
            progress,
            duration,
            status.as_str(),
            now_str,
            topic_id,
        ],
    )?;

    let session = get_session(&tx, &session.id)?;
    let topic = get_topic(&tx, user_id, topic_id)?;
    tx.commit()?;

    tracing::info!(
        user_id,
        topic_id,
        duration_minutes = duration,
        new_concepts = new_concepts.len(),
        "learning progress saved"
    );
    Ok(SavedProgress {
        topic,
        session,
        new_concepts,
    })
}
