//! Shared API error type and the small status endpoints.

use crate::middleware::Caller;
use crate::{with_conn, AppState, InternalError};
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use murmur_accounts::AccountError;
use murmur_google::GoogleError;
use murmur_learning::LearningError;
use murmur_sessions::SessionError;
use murmur_todos::TodoError;
use murmur_tools::ToolError;
use murmur_voice::VoiceError;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    /// A remote collaborator failed; `details` carries its answer.
    #[error("upstream failure: {message}: {details}")]
    Upstream { message: String, details: String },
    #[error("upstream timeout: {0}")]
    UpstreamTimeout(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ApiError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body: `{"error": …}` plus `details` for upstream failures.
    pub fn body(&self) -> Value {
        match self {
            ApiError::Upstream { message, details } => json!({
                "error": message,
                "details": details,
            }),
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::UpstreamTimeout(msg)
            | ApiError::NotConfigured(msg)
            | ApiError::InternalServerError(msg) => json!({ "error": msg }),
        }
    }
}

/// Parses an optional enum label from a request; blank means absent.
pub(crate) fn parse_label<T>(raw: Option<&str>) -> Result<Option<T>, ApiError>
where
    T: std::str::FromStr<Err = murmur_types::ParseEnumError>,
{
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(|e: murmur_types::ParseEnumError| ApiError::BadRequest(e.to_string())))
        .transpose()
}

/// `caller`'s user id; routes behind `require_identity` always have one.
pub(crate) fn caller_id(caller: &Caller) -> Result<String, ApiError> {
    caller
        .user_id()
        .map(str::to_string)
        .ok_or_else(|| ApiError::Unauthorized("No token provided".to_string()))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if matches!(self, ApiError::InternalServerError(_)) {
            tracing::error!(error = %self, "request failed");
        }
        (self.status(), Json(self.body())).into_response()
    }
}

impl From<InternalError> for ApiError {
    fn from(err: InternalError) -> Self {
        ApiError::InternalServerError(err.to_string())
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(_) => ApiError::NotFound("Session not found".to_string()),
            SessionError::Duplicate(_) | SessionError::Conflict(_) => {
                ApiError::Conflict(err.to_string())
            }
            SessionError::Database(_)
            | SessionError::Serialization(_)
            | SessionError::Corrupt { .. } => ApiError::InternalServerError(err.to_string()),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::NotFound(_) => ApiError::NotFound("Account not found".to_string()),
            AccountError::Expired(_) => ApiError::Unauthorized(err.to_string()),
            AccountError::Database(_) | AccountError::Json(_) => {
                ApiError::InternalServerError(err.to_string())
            }
        }
    }
}

impl From<ToolError> for ApiError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Accounts(e) => e.into(),
        }
    }
}

impl From<TodoError> for ApiError {
    fn from(err: TodoError) -> Self {
        match err {
            TodoError::NotFound(_) => ApiError::NotFound("Todo not found".to_string()),
            TodoError::NoMatch(_) => ApiError::NotFound(err.to_string()),
            TodoError::DuplicateCategory(name) => {
                ApiError::Conflict(format!("Category '{name}' already exists"))
            }
            TodoError::Validation(msg) => ApiError::BadRequest(msg),
            TodoError::Database(_) => ApiError::InternalServerError(err.to_string()),
        }
    }
}

impl From<LearningError> for ApiError {
    fn from(err: LearningError) -> Self {
        match err {
            LearningError::NotFound(_) => ApiError::NotFound("Learning topic not found".to_string()),
            LearningError::Validation(msg) => ApiError::BadRequest(msg),
            LearningError::Database(_) | LearningError::Json(_) => {
                ApiError::InternalServerError(err.to_string())
            }
        }
    }
}

impl From<VoiceError> for ApiError {
    fn from(err: VoiceError) -> Self {
        match err {
            VoiceError::NotConfigured => {
                ApiError::NotConfigured("OpenAI API key not configured".to_string())
            }
            VoiceError::Timeout => {
                ApiError::UpstreamTimeout("conversation provider timed out".to_string())
            }
            VoiceError::Upstream { body, .. } => ApiError::Upstream {
                message: "Failed to create realtime session".to_string(),
                details: body,
            },
            VoiceError::Transport(details) | VoiceError::InvalidResponse(details) => {
                ApiError::Upstream {
                    message: "Failed to create realtime session".to_string(),
                    details,
                }
            }
        }
    }
}

impl From<GoogleError> for ApiError {
    fn from(err: GoogleError) -> Self {
        match err {
            GoogleError::NotConfigured => {
                ApiError::NotConfigured("Google OAuth not configured".to_string())
            }
            GoogleError::Timeout => ApiError::UpstreamTimeout("google request timed out".to_string()),
            GoogleError::NotFound(what) => ApiError::NotFound(format!("{what} not found")),
            GoogleError::Validation(msg) => ApiError::BadRequest(msg),
            GoogleError::Upstream { .. }
            | GoogleError::Transport(_)
            | GoogleError::InvalidResponse(_) => ApiError::Upstream {
                message: "Google request failed".to_string(),
                details: err.to_string(),
            },
        }
    }
}

/// Handler for `GET /health`.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "OK",
        "timestamp": murmur_db::format_timestamp(chrono::Utc::now()),
    }))
}

/// Handler for `GET /api/check-config`.
///
/// Reports which collaborators are configured, and for a verified caller how
/// many accounts they have connected.
pub async fn check_config_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Value>, ApiError> {
    let user_id = caller.user_id().map(str::to_string);
    let pool = state.pool.clone();
    let connected = with_conn(&pool, move |conn| {
        murmur_accounts::count_accounts(conn, user_id.as_deref()).map_err(ApiError::from)
    })
    .await?;

    Ok(Json(json!({
        "hasApiKey": state.conversation.is_configured(),
        "hasGoogleOAuth": state.oauth.is_configured(),
        "hasSupabase": state.identity.is_configured(),
        "environment": state.settings.environment,
        "connectedGoogleAccounts": connected,
        "isAuthenticated": caller.is_authenticated(),
    })))
}

/// Handler for `GET /api/auth/profile`.
pub async fn profile_handler(Extension(caller): Extension<Caller>) -> Json<Value> {
    Json(json!({ "user": caller.user }))
}
