//! Session lifecycle: minting, mode switches, account selection, status.
//!
//! Every mutation goes through [`murmur_sessions::apply_event`]. Tool sets
//! are recomputed only after the triggering event committed, from the
//! committed row, and written back with a `ToolsRecomputed` event that the
//! store drops if the mode moved on in the meantime.

use crate::api::ApiError;
use crate::best_effort::BestEffort;
use crate::{with_conn, AppState};
use murmur_db::DbPool;
use murmur_sessions::{
    apply_event, Applied, ConversationMessage, NewMessage, NewSession, Session, SessionEvent,
    SessionQuery, Skip,
};
use murmur_tools::resolve_for_user;
use murmur_types::{Mode, ModelConfig, SessionStatus, ToolDefinition};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Value};

/// A session the provider accepted.
#[derive(Debug, Clone)]
pub struct CreatedSession {
    /// Provider response, relayed to the browser.
    pub payload: Value,
    /// Internal id; `None` when persisting failed after the provider answered.
    pub session_id: Option<String>,
    pub active_tools: Vec<String>,
}

impl CreatedSession {
    /// Provider payload extended with `session_id` and `active_tools`.
    pub fn into_body(self) -> Value {
        let mut body = self.payload;
        if let Value::Object(map) = &mut body {
            if let Some(id) = self.session_id {
                map.insert("session_id".to_string(), Value::String(id));
            }
            map.insert("active_tools".to_string(), json!(self.active_tools));
        }
        body
    }
}

/// Tool set after a mode switch or account selection.
#[derive(Debug, Clone, Serialize)]
pub struct ToolUpdate {
    pub mode: Mode,
    /// The mode the tool set actually reflects; differs from `mode` when an
    /// account-scoped mode was requested without connected accounts.
    pub granted_mode: Mode,
    pub tools: Vec<ToolDefinition>,
    pub active_tools: Vec<String>,
    /// Whether `active_tools` differs from what the session exposed before.
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_account: Option<String>,
}

/// Resolves the mode-less tool set, mints a provider session with it and
/// stores the session.
///
/// Provider failures propagate and nothing is stored. A storage failure
/// after the provider answered is logged and the session is returned
/// without `session_id`.
pub async fn create_session(
    state: &AppState,
    user_id: Option<String>,
    model: ModelConfig,
) -> Result<CreatedSession, ApiError> {
    let lookup_user = user_id.clone();
    let resolution = with_conn(&state.pool, move |conn| {
        resolve_for_user(conn, Mode::None, lookup_user.as_deref()).map_err(ApiError::from)
    })
    .await?;

    let minted = state
        .conversation
        .create_ephemeral_session(&model, &resolution.tools)
        .await?;
    tracing::info!(provider_session_id = %minted.id, "conversation session minted");

    let active_tools = resolution.names();
    let new = NewSession {
        provider_session_id: minted.id.clone(),
        user_id,
        model: model.model.clone(),
        voice: model.voice.clone(),
        active_tools: active_tools.clone(),
        metadata: json!({ "expires_at": minted.client_secret_expires_at }),
    };
    let stored = BestEffort::from_result(
        "persist session",
        with_conn(&state.pool, move |conn| {
            murmur_sessions::create_session(conn, &new).map_err(ApiError::from)
        })
        .await,
    );

    Ok(CreatedSession {
        payload: minted.payload,
        session_id: stored.ok().map(|s| s.id),
        active_tools,
    })
}

fn ensure_live(applied: &Applied) -> Result<(), ApiError> {
    if applied.skipped == Some(Skip::Terminal) {
        return Err(ApiError::Conflict("session has ended".to_string()));
    }
    Ok(())
}

/// Re-resolves tools for the committed state of `applied` and stores them.
///
/// Anonymous sessions resolve against `caller`'s accounts.
fn recompute_tools(
    conn: &Connection,
    applied: &Applied,
    caller: Option<&str>,
) -> Result<ToolUpdate, ApiError> {
    let committed = &applied.after;
    let user = committed.user_id.as_deref().or(caller);
    let resolution = resolve_for_user(conn, committed.mode, user)?;
    let names = resolution.names();

    BestEffort::from_result(
        "refresh tool cache",
        apply_event(
            conn,
            &committed.id,
            &SessionEvent::ToolsRecomputed {
                mode: committed.mode,
                tools: names.clone(),
            },
        ),
    )
    .ok();

    Ok(ToolUpdate {
        mode: committed.mode,
        granted_mode: resolution.granted_mode,
        changed: names != applied.before.active_tools,
        tools: resolution.tools,
        active_tools: names,
        selected_account: committed.selected_account.clone(),
    })
}

/// Switches the session with internal id `session_id` to `mode`.
///
/// `mode` is validated before anything is read.
pub async fn switch_mode(
    pool: &DbPool,
    session_id: &str,
    caller: Option<&str>,
    mode: &str,
) -> Result<ToolUpdate, ApiError> {
    let mode: Mode = mode
        .trim()
        .parse()
        .map_err(|e: murmur_types::ParseEnumError| ApiError::BadRequest(e.to_string()))?;
    let session_id = session_id.to_string();
    let caller = caller.map(str::to_string);

    with_conn(pool, move |conn| -> Result<ToolUpdate, ApiError> {
        let applied = apply_event(conn, &session_id, &SessionEvent::ModeChanged { mode })?;
        ensure_live(&applied)?;
        let update = recompute_tools(conn, &applied, caller.as_deref())?;
        tracing::info!(
            session_id = %session_id,
            mode = %update.mode,
            granted_mode = %update.granted_mode,
            changed = update.changed,
            "session mode switched"
        );
        Ok(update)
    })
    .await
}

/// Points the session's account-scoped tools at `user_id`'s account `email`.
///
/// The account must belong to `user_id`; another user's account with the
/// same address is reported as not found. Claims anonymous sessions.
pub async fn select_account(
    pool: &DbPool,
    session_id: &str,
    user_id: &str,
    email: &str,
) -> Result<ToolUpdate, ApiError> {
    let session_id = session_id.to_string();
    let user_id = user_id.to_string();
    let email = email.trim().to_string();

    with_conn(pool, move |conn| -> Result<ToolUpdate, ApiError> {
        let account = murmur_accounts::find_by_email(conn, &user_id, &email)?;
        let applied = apply_event(
            conn,
            &session_id,
            &SessionEvent::AccountSelected {
                email: account.email.clone(),
                user_id: user_id.clone(),
            },
        )?;
        ensure_live(&applied)?;
        // Claiming an anonymous session changes whose accounts the
        // select_account description lists, so recompute in every mode.
        let update = recompute_tools(conn, &applied, Some(&user_id))?;
        tracing::info!(session_id = %session_id, account = %account.email, "account selected");
        Ok(update)
    })
    .await
}

/// Client-reported status change.
///
/// `status` defaults to the current one. Updates to an ended session leave
/// it untouched and return it as stored.
pub async fn update_status(
    pool: &DbPool,
    session_id: &str,
    status: Option<SessionStatus>,
    error_message: Option<String>,
    duration_seconds: Option<i64>,
    total_messages: Option<i64>,
) -> Result<Session, ApiError> {
    let session_id = session_id.to_string();
    with_conn(pool, move |conn| -> Result<Session, ApiError> {
        let current = murmur_sessions::get_session(conn, &session_id)?;
        let event = SessionEvent::StatusChanged {
            status: status.unwrap_or(current.status),
            error_message,
            duration_seconds,
            total_messages,
        };
        let applied = apply_event(conn, &session_id, &event)?;
        if applied.was_applied() && applied.after.status.is_terminal() {
            tracing::info!(session_id = %session_id, status = %applied.after.status, "session ended");
        }
        Ok(applied.after)
    })
    .await
}

/// Deletes a session and its transcript. `false` when it did not exist.
pub async fn delete_session(pool: &DbPool, session_id: &str) -> Result<bool, ApiError> {
    let session_id = session_id.to_string();
    with_conn(pool, move |conn| {
        murmur_sessions::delete_session(conn, &session_id).map_err(ApiError::from)
    })
    .await
}

/// Stores a transcript message, then bumps the session's message counter.
pub async fn record_message(
    pool: &DbPool,
    session_id: &str,
    message: NewMessage,
) -> Result<ConversationMessage, ApiError> {
    let session_id = session_id.to_string();
    with_conn(pool, move |conn| -> Result<ConversationMessage, ApiError> {
        let stored = murmur_sessions::record_message(conn, &session_id, &message)?;
        BestEffort::from_result(
            "count message",
            apply_event(conn, &session_id, &SessionEvent::MessageRecorded),
        )
        .ok();
        Ok(stored)
    })
    .await
}

pub async fn list_sessions(pool: &DbPool, query: SessionQuery) -> Result<Vec<Session>, ApiError> {
    with_conn(pool, move |conn| {
        murmur_sessions::list_sessions(conn, &query).map_err(ApiError::from)
    })
    .await
}

/// Fetches a session by internal or provider id together with its transcript.
pub async fn session_with_messages(
    pool: &DbPool,
    reference: &str,
) -> Result<(Session, Vec<ConversationMessage>), ApiError> {
    let reference = reference.to_string();
    with_conn(pool, move |conn| -> Result<(Session, Vec<ConversationMessage>), ApiError> {
        let session = murmur_sessions::find_session(conn, &reference)?;
        let messages = murmur_sessions::list_messages(conn, &session.id)?;
        Ok((session, messages))
    })
    .await
}
