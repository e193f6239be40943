use crate::model::{map_row, SESSION_COLUMNS};
use crate::{transition, NewSession, Session, SessionError, SessionEvent, Skip, Transition};
use chrono::Utc;
use murmur_db::format_timestamp;
use murmur_types::{Mode, SessionStatus};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

/// Attempts made by [`apply_event`] before giving up with
/// [`SessionError::Conflict`].
pub const MAX_WRITE_ATTEMPTS: usize = 5;

/// Outcome of [`apply_event`].
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// The row as read before the event was folded in.
    pub before: Session,
    /// The row as stored afterwards (equal to `before` when skipped).
    pub after: Session,
    /// Set when the transition dropped the event.
    pub skipped: Option<Skip>,
}

impl Applied {
    pub fn was_applied(&self) -> bool {
        self.skipped.is_none()
    }
}

/// Filter for [`list_sessions`].
#[derive(Debug, Clone, Default)]
pub struct SessionQuery {
    /// Owner to list for; `None` lists anonymous sessions.
    pub user_id: Option<String>,
    pub status: Option<SessionStatus>,
    pub limit: u32,
    pub offset: u32,
}

/// Inserts a new active session in mode `none`.
pub fn create_session(conn: &Connection, new: &NewSession) -> Result<Session, SessionError> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = format_timestamp(Utc::now());
    let tools_json = serde_json::to_string(&new.active_tools)?;
    let metadata = if new.metadata.is_null() {
        serde_json::json!({})
    } else {
        new.metadata.clone()
    };
    let metadata_json = serde_json::to_string(&metadata)?;

    let inserted = conn.execute(
        "INSERT INTO realtime_sessions (
            id, provider_session_id, user_id, mode, active_tools_json, status,
            model, voice, metadata_json, started_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        params![
            id,
            new.provider_session_id,
            new.user_id,
            Mode::None.as_str(),
            tools_json,
            SessionStatus::Active.as_str(),
            new.model,
            new.voice,
            metadata_json,
            now,
        ],
    );

    match inserted {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
            return Err(SessionError::Duplicate(new.provider_session_id.clone()));
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(
        session_id = %id,
        provider_session_id = %new.provider_session_id,
        anonymous = new.user_id.is_none(),
        "session created"
    );
    get_session(conn, &id)
}

fn query_one(
    conn: &Connection,
    filter: &str,
    value: &str,
) -> Result<Option<Session>, SessionError> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM realtime_sessions WHERE {filter}");
    conn.query_row(&sql, [value], map_row)
        .optional()?
        .map(Session::try_from)
        .transpose()
}

/// Fetches a session by internal id.
pub fn get_session(conn: &Connection, id: &str) -> Result<Session, SessionError> {
    query_one(conn, "id = ?1", id)?.ok_or_else(|| SessionError::NotFound(id.to_string()))
}

/// Fetches a session by the provider-issued session id.
pub fn get_by_provider_id(
    conn: &Connection,
    provider_session_id: &str,
) -> Result<Session, SessionError> {
    query_one(conn, "provider_session_id = ?1", provider_session_id)?
        .ok_or_else(|| SessionError::NotFound(provider_session_id.to_string()))
}

/// Fetches a session by either its internal id or its provider id.
pub fn find_session(conn: &Connection, reference: &str) -> Result<Session, SessionError> {
    query_one(conn, "id = ?1 OR provider_session_id = ?1", reference)?
        .ok_or_else(|| SessionError::NotFound(reference.to_string()))
}

fn write_if_unchanged(
    conn: &Connection,
    next: &Session,
    expected_version: i64,
) -> Result<bool, SessionError> {
    let changed = conn.execute(
        "UPDATE realtime_sessions SET
            user_id = ?1, mode = ?2, selected_account = ?3, active_tools_json = ?4,
            status = ?5, error_message = ?6, duration_seconds = ?7,
            total_messages = ?8, tool_calls = ?9, updated_at = ?10, ended_at = ?11,
            version = version + 1
        WHERE id = ?12 AND version = ?13",
        params![
            next.user_id,
            next.mode.as_str(),
            next.selected_account,
            serde_json::to_string(&next.active_tools)?,
            next.status.as_str(),
            next.error_message,
            next.duration_seconds,
            next.total_messages,
            next.tool_calls,
            next.updated_at,
            next.ended_at,
            next.id,
            expected_version,
        ],
    )?;
    Ok(changed == 1)
}

/// Applies `event` to the session with internal id `id`.
///
/// Reads the row, folds the event in with [`transition`] and writes the result
/// only if nobody bumped the version in between. A lost race re-reads and
/// retries up to [`MAX_WRITE_ATTEMPTS`] times.
pub fn apply_event(
    conn: &Connection,
    id: &str,
    event: &SessionEvent,
) -> Result<Applied, SessionError> {
    for attempt in 1..=MAX_WRITE_ATTEMPTS {
        let before = get_session(conn, id)?;
        let mut next = match transition(&before, event, Utc::now()) {
            Transition::Apply(next) => next,
            Transition::Skip(reason) => {
                tracing::debug!(session_id = %id, event = event.kind(), ?reason, "event skipped");
                return Ok(Applied {
                    after: before.clone(),
                    before,
                    skipped: Some(reason),
                });
            }
        };

        if write_if_unchanged(conn, &next, before.version)? {
            next.version = before.version + 1;
            tracing::debug!(session_id = %id, event = event.kind(), version = next.version, "event applied");
            return Ok(Applied {
                before,
                after: next,
                skipped: None,
            });
        }

        tracing::debug!(session_id = %id, event = event.kind(), attempt, "version race lost, retrying");
    }

    tracing::warn!(session_id = %id, event = event.kind(), "session write retries exhausted");
    Err(SessionError::Conflict(id.to_string()))
}

/// Deletes a session and, through the foreign key, its transcript.
///
/// Returns `false` when no such session existed.
pub fn delete_session(conn: &Connection, id: &str) -> Result<bool, SessionError> {
    let deleted = conn.execute("DELETE FROM realtime_sessions WHERE id = ?1", [id])?;
    if deleted > 0 {
        tracing::info!(session_id = %id, "session deleted");
    }
    Ok(deleted > 0)
}

/// Lists sessions for one owner, newest first.
pub fn list_sessions(conn: &Connection, query: &SessionQuery) -> Result<Vec<Session>, SessionError> {
    let sql = format!(
        "SELECT {SESSION_COLUMNS} FROM realtime_sessions
        WHERE user_id IS ?1 AND (?2 IS NULL OR status = ?2)
        ORDER BY started_at DESC, id ASC
        LIMIT ?3 OFFSET ?4"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![
            query.user_id,
            query.status.map(|s| s.as_str()),
            query.limit,
            query.offset,
        ],
        map_row,
    )?;

    let mut sessions = Vec::new();
    for row in rows {
        sessions.push(Session::try_from(row?)?);
    }
    Ok(sessions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_db::run_migrations;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        conn.execute_batch("PRAGMA foreign_keys = ON;").expect("fk");
        run_migrations(&conn).expect("migrations should succeed");
        conn
    }

    fn new_session(provider_id: &str, user: Option<&str>) -> NewSession {
        NewSession {
            provider_session_id: provider_id.to_string(),
            user_id: user.map(str::to_string),
            model: "gpt-4o-realtime-preview".into(),
            voice: "verse".into(),
            active_tools: vec!["set_mode".into(), "select_account".into()],
            metadata: serde_json::json!({"client_secret_expires_at": 123}),
        }
    }

    #[test]
    fn create_and_fetch_by_either_id() {
        let conn = setup();
        let created = create_session(&conn, &new_session("sess_a", Some("u1"))).unwrap();
        assert_eq!(created.mode, Mode::None);
        assert_eq!(created.status, SessionStatus::Active);
        assert_eq!(created.version, 0);
        assert_eq!(created.metadata["client_secret_expires_at"], 123);

        assert_eq!(get_by_provider_id(&conn, "sess_a").unwrap(), created);
        assert_eq!(find_session(&conn, &created.id).unwrap(), created);
        assert_eq!(find_session(&conn, "sess_a").unwrap(), created);
        assert!(matches!(
            find_session(&conn, "sess_missing"),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn provider_id_is_unique() {
        let conn = setup();
        create_session(&conn, &new_session("sess_a", None)).unwrap();
        assert!(matches!(
            create_session(&conn, &new_session("sess_a", None)),
            Err(SessionError::Duplicate(id)) if id == "sess_a"
        ));
    }

    #[test]
    fn apply_event_bumps_version() {
        let conn = setup();
        let s = create_session(&conn, &new_session("sess_a", None)).unwrap();

        let applied = apply_event(&conn, &s.id, &SessionEvent::ModeChanged { mode: Mode::Todo }).unwrap();
        assert!(applied.was_applied());
        assert_eq!(applied.before.mode, Mode::None);
        assert_eq!(applied.after.mode, Mode::Todo);
        assert_eq!(applied.after.version, 1);
        assert_eq!(get_session(&conn, &s.id).unwrap(), applied.after);
    }

    #[test]
    fn stale_version_write_is_rejected() {
        let conn = setup();
        let s = create_session(&conn, &new_session("sess_a", None)).unwrap();
        apply_event(&conn, &s.id, &SessionEvent::MessageRecorded).unwrap();

        let mut stale = s.clone();
        stale.mode = Mode::Email;
        assert!(!write_if_unchanged(&conn, &stale, s.version).unwrap());
        assert_eq!(get_session(&conn, &s.id).unwrap().mode, Mode::None);
    }

    #[test]
    fn terminal_sessions_ignore_further_events() {
        let conn = setup();
        let s = create_session(&conn, &new_session("sess_a", None)).unwrap();
        let ended = apply_event(
            &conn,
            &s.id,
            &SessionEvent::StatusChanged {
                status: SessionStatus::Completed,
                error_message: None,
                duration_seconds: Some(42),
                total_messages: Some(7),
            },
        )
        .unwrap()
        .after;
        assert!(ended.ended_at.is_some());

        let again = apply_event(
            &conn,
            &s.id,
            &SessionEvent::StatusChanged {
                status: SessionStatus::Failed,
                error_message: Some("late".into()),
                duration_seconds: None,
                total_messages: None,
            },
        )
        .unwrap();
        assert_eq!(again.skipped, Some(Skip::Terminal));
        assert_eq!(again.after, ended);

        let call = apply_event(&conn, &s.id, &SessionEvent::ToolCallRecorded).unwrap();
        assert_eq!(call.after.tool_calls, 0);
    }

    #[test]
    fn missing_session_event_is_not_found() {
        let conn = setup();
        assert!(matches!(
            apply_event(&conn, "nope", &SessionEvent::MessageRecorded),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn delete_reports_whether_anything_was_removed() {
        let conn = setup();
        let s = create_session(&conn, &new_session("sess_a", None)).unwrap();
        assert!(delete_session(&conn, &s.id).unwrap());
        assert!(!delete_session(&conn, &s.id).unwrap());
    }

    #[test]
    fn list_filters_by_owner_and_status() {
        let conn = setup();
        let a = create_session(&conn, &new_session("sess_a", Some("u1"))).unwrap();
        create_session(&conn, &new_session("sess_b", Some("u1"))).unwrap();
        create_session(&conn, &new_session("sess_c", Some("u2"))).unwrap();
        create_session(&conn, &new_session("sess_d", None)).unwrap();
        apply_event(
            &conn,
            &a.id,
            &SessionEvent::StatusChanged {
                status: SessionStatus::Completed,
                error_message: None,
                duration_seconds: None,
                total_messages: None,
            },
        )
        .unwrap();

        let all = SessionQuery {
            user_id: Some("u1".into()),
            status: None,
            limit: 50,
            offset: 0,
        };
        assert_eq!(list_sessions(&conn, &all).unwrap().len(), 2);

        let completed = SessionQuery {
            status: Some(SessionStatus::Completed),
            ..all.clone()
        };
        let found = list_sessions(&conn, &completed).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].provider_session_id, "sess_a");

        let paged = SessionQuery { limit: 1, offset: 1, ..all };
        assert_eq!(list_sessions(&conn, &paged).unwrap().len(), 1);

        let anonymous = SessionQuery {
            limit: 10,
            ..SessionQuery::default()
        };
        let anon = list_sessions(&conn, &anonymous).unwrap();
        assert_eq!(anon.len(), 1);
        assert_eq!(anon[0].provider_session_id, "sess_d");
    }
}
