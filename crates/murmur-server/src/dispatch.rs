//! Tool invocation pipeline.
//!
//! A model-issued call runs through fixed stages and stops at the first
//! failure:
//!
//! 0. catalog lookup of the tool name;
//! 1. session resolution by provider id, then availability of the tool in
//!    the tool set re-resolved for the session's mode;
//! 2. authorization tier;
//! 3. account scope (a selected account is required, otherwise the model
//!    gets a remediation payload listing the accounts it may select);
//! 4. credentials for the selected account, refreshed when expired;
//! 5. the domain handler, bounded by the configured tool timeout;
//! 6. best-effort bookkeeping on the session.

use crate::api::ApiError;
use crate::best_effort::BestEffort;
use crate::credentials;
use crate::middleware::Caller;
use crate::tools::{self, Args, ToolContext};
use crate::{with_conn, AppState, InternalError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use murmur_accounts::{Account, AccountError, AccountSummary};
use murmur_sessions::{Session, SessionError, SessionEvent};
use murmur_tools::catalog::{
    CALENDAR_ACTIONS, EMAIL_ACTIONS, LEARNING_ACTIONS, SELECT_ACCOUNT, SET_MODE, TODO_ACTIONS,
};
use murmur_tools::{CatalogEntry, Resolution};
use murmur_types::Mode;
use serde_json::{json, Map, Value};
use thiserror::Error;

const RESERVED_KEYS: [&str; 4] = ["action", "args", "sessionRef", "session_ref"];

/// A parsed `POST /api/tools/{toolName}` body.
#[derive(Debug, Clone, Default)]
pub struct ToolRequest {
    pub action: Option<String>,
    /// Provider-issued session id.
    pub session_ref: Option<String>,
    pub args: Args,
}

impl ToolRequest {
    /// Accepts `{action?, args?, sessionRef | session_ref, …}`. Top-level
    /// fields are folded into `args`; keys inside `args` win.
    pub fn from_body(body: Value) -> Result<Self, DispatchError> {
        let mut top = match body {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => {
                return Err(ApiError::BadRequest("request body must be a JSON object".into()).into())
            }
        };

        let explicit = match top.remove("args") {
            Some(Value::Object(map)) => map,
            Some(Value::Null) | None => Map::new(),
            Some(_) => return Err(ApiError::BadRequest("args must be an object".into()).into()),
        };
        let session_ref = ["sessionRef", "session_ref"]
            .iter()
            .find_map(|key| top.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let mut merged: Map<String, Value> = top
            .into_iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()) || key == "action")
            .collect();
        merged.extend(explicit);

        let action = merged
            .get("action")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);

        Ok(Self {
            action,
            session_ref,
            args: Args::new(merged),
        })
    }
}

/// Why a tool invocation was refused or failed.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("sessionRef is required")]
    MissingSession,
    #[error("session not found")]
    SessionNotFound,
    #[error("session has ended")]
    SessionEnded,
    #[error("unknown tool for current mode")]
    UnknownToolForMode { mode: Mode, available: Vec<String> },
    #[error("authentication required")]
    AuthRequired,
    #[error("selected account no longer connected")]
    AccountNotConnected,
    #[error("action is required for {0}")]
    MissingAction(String),
    #[error("unknown action '{action}' for {tool}")]
    UnknownAction { tool: String, action: String },
    #[error("upstream timeout")]
    UpstreamTimeout,
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl From<InternalError> for DispatchError {
    fn from(err: InternalError) -> Self {
        DispatchError::Api(err.into())
    }
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::UnknownTool(_)
            | DispatchError::SessionNotFound
            | DispatchError::AccountNotConnected => StatusCode::NOT_FOUND,
            DispatchError::MissingSession
            | DispatchError::UnknownToolForMode { .. }
            | DispatchError::MissingAction(_)
            | DispatchError::UnknownAction { .. } => StatusCode::BAD_REQUEST,
            DispatchError::SessionEnded => StatusCode::CONFLICT,
            DispatchError::AuthRequired => StatusCode::UNAUTHORIZED,
            DispatchError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            DispatchError::Api(api) => api.status(),
        }
    }

    pub fn body(&self) -> Value {
        let mut body = match self {
            DispatchError::Api(api) => api.body(),
            other => json!({ "error": other.to_string() }),
        };
        body["success"] = Value::Bool(false);
        match self {
            DispatchError::UnknownToolForMode { mode, available } => {
                body["action"] = json!("unknown_tool_for_mode");
                body["mode"] = json!(mode);
                body["available_tools"] = json!(available);
            }
            DispatchError::AccountNotConnected => {
                body["action"] = json!("select_account_required");
            }
            DispatchError::AuthRequired => {
                body["action"] = json!("sign_in_required");
            }
            _ => {}
        }
        body
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

fn remediation(available_accounts: Vec<AccountSummary>) -> Value {
    json!({
        "success": false,
        "error": "No account selected. Ask the user which account to use, then call select_account.",
        "action": "select_account_required",
        "available_accounts": available_accounts,
    })
}

/// Stage 1: the session, checked for visibility and liveness, with the
/// tool set re-resolved for its current mode.
async fn load_session(
    state: &AppState,
    session_ref: String,
    caller: Option<String>,
) -> Result<(Session, Resolution), DispatchError> {
    with_conn(&state.pool, move |conn| -> Result<_, DispatchError> {
        let session = match murmur_sessions::get_by_provider_id(conn, &session_ref) {
            Ok(session) => session,
            Err(SessionError::NotFound(_)) => return Err(DispatchError::SessionNotFound),
            Err(e) => return Err(ApiError::from(e).into()),
        };
        if !session.is_visible_to(caller.as_deref()) {
            return Err(DispatchError::SessionNotFound);
        }
        if session.status.is_terminal() {
            return Err(DispatchError::SessionEnded);
        }

        let user = session.user_id.as_deref().or(caller.as_deref());
        let resolution =
            murmur_tools::resolve_for_user(conn, session.mode, user).map_err(ApiError::from)?;

        let names = resolution.names();
        if names != session.active_tools {
            tracing::debug!(session_id = %session.id, "stored tool set is stale, refreshing");
            BestEffort::from_result(
                "refresh tool cache",
                murmur_sessions::apply_event(
                    conn,
                    &session.id,
                    &SessionEvent::ToolsRecomputed {
                        mode: session.mode,
                        tools: names,
                    },
                ),
            )
            .ok();
        }
        Ok((session, resolution))
    })
    .await
}

/// Stage 4: credentials for the selected account, refreshed if expired.
async fn load_credentials(
    state: &AppState,
    user: Option<String>,
    email: String,
) -> Result<Account, DispatchError> {
    let lookup = with_conn(&state.pool, move |conn| -> Result<_, DispatchError> {
        Ok(murmur_accounts::credentials_for(conn, user.as_deref(), &email))
    })
    .await?;

    match credentials::expired_or(lookup) {
        Ok((account, false)) => Ok(account),
        Ok((account, true)) => Ok(credentials::refresh_account(state, account).await?),
        Err(AccountError::NotFound(_)) => Err(DispatchError::AccountNotConnected),
        Err(e) => Err(ApiError::from(e).into()),
    }
}

async fn run_domain(
    entry: &CatalogEntry,
    ctx: &ToolContext,
    action: &str,
    args: &Args,
) -> Result<Value, ApiError> {
    match entry.name() {
        EMAIL_ACTIONS => tools::email::execute(ctx, action, args).await,
        CALENDAR_ACTIONS => tools::calendar::execute(ctx, action, args).await,
        TODO_ACTIONS => tools::todo::execute(ctx, action, args).await,
        LEARNING_ACTIONS => tools::learning::execute(ctx, action, args).await,
        other => Err(ApiError::InternalServerError(format!(
            "no handler registered for {other}"
        ))),
    }
}

/// Runs one tool invocation for `caller`.
///
/// `Ok` covers both results and remediation payloads (`success: false`,
/// HTTP 200); `Err` is a refusal or failure with its own status.
pub async fn dispatch(
    state: &AppState,
    caller: &Caller,
    tool_name: &str,
    request: ToolRequest,
) -> Result<Value, DispatchError> {
    let entry =
        murmur_tools::find(tool_name).ok_or_else(|| DispatchError::UnknownTool(tool_name.into()))?;
    let session_ref = request.session_ref.ok_or(DispatchError::MissingSession)?;
    let caller_id = caller.user_id().map(str::to_string);

    let (session, resolution) = load_session(state, session_ref, caller_id.clone()).await?;
    if !resolution.contains(entry.name()) {
        return Err(DispatchError::UnknownToolForMode {
            mode: session.mode,
            available: resolution.names(),
        });
    }

    if !entry.tier.permits(caller.is_authenticated()) {
        return Err(DispatchError::AuthRequired);
    }

    let args = request.args;
    let result = if entry.is_meta() {
        match entry.name() {
            SET_MODE => {
                tools::meta::set_mode(&state.pool, &session.id, caller_id.as_deref(), &args).await?
            }
            SELECT_ACCOUNT => {
                let user = caller_id.as_deref().ok_or(DispatchError::AuthRequired)?;
                tools::meta::select_account(&state.pool, &session.id, user, &args).await?
            }
            other => {
                return Err(ApiError::InternalServerError(format!(
                    "no handler registered for {other}"
                ))
                .into())
            }
        }
    } else {
        let user = session.user_id.clone().or(caller_id.clone());

        let account = if entry.account_scoped {
            let Some(email) = session.selected_account.clone() else {
                let lookup_user = user.clone();
                let available = with_conn(&state.pool, move |conn| {
                    murmur_accounts::accounts_for_user(conn, lookup_user.as_deref())
                        .map(|accounts| accounts.iter().map(Account::summary).collect::<Vec<_>>())
                        .map_err(ApiError::from)
                })
                .await?;
                tracing::info!(session_id = %session.id, tool = entry.name(), "account selection required");
                return Ok(remediation(available));
            };
            Some(load_credentials(state, user.clone(), email).await?)
        } else {
            None
        };

        let action = request
            .action
            .ok_or_else(|| DispatchError::MissingAction(entry.name().to_string()))?;
        if !entry.actions.contains(&action.as_str()) {
            return Err(DispatchError::UnknownAction {
                tool: entry.name().to_string(),
                action,
            });
        }

        let ctx = ToolContext {
            pool: state.pool.clone(),
            user_id: user,
            session: session.clone(),
            account,
            mail: state.mail.clone(),
            calendar: state.calendar.clone(),
        };
        match tokio::time::timeout(
            state.settings.tool_timeout,
            run_domain(entry, &ctx, &action, &args),
        )
        .await
        {
            Ok(outcome) => outcome?,
            Err(_) => {
                tracing::warn!(
                    session_id = %session.id,
                    tool = entry.name(),
                    action = %action,
                    timeout_secs = state.settings.tool_timeout.as_secs(),
                    "tool execution timed out"
                );
                return Err(DispatchError::UpstreamTimeout);
            }
        }
    };

    let session_id = session.id.clone();
    BestEffort::from_result(
        "count tool call",
        with_conn(&state.pool, move |conn| {
            murmur_sessions::apply_event(conn, &session_id, &SessionEvent::ToolCallRecorded)
                .map_err(ApiError::from)
        })
        .await,
    )
    .ok();
    tracing::info!(session_id = %session.id, tool = entry.name(), "tool call completed");
    Ok(result)
}
