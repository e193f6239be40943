use crate::api::ApiError;
use crate::lifecycle;
use crate::middleware::Caller;
use crate::{with_conn, AppState};
use axum::{
    body::Bytes,
    extract::{Extension, Path, Query},
    response::Json,
};
use murmur_db::DbPool;
use murmur_sessions::{MessageType, NewMessage, Session, SessionQuery};
use murmur_types::{ModelConfig, SessionStatus};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Default page size for session listings.
const DEFAULT_LIST_LIMIT: u32 = 10;
/// Largest page size a client may request.
const MAX_LIST_LIMIT: u32 = 100;

#[derive(Deserialize)]
pub struct ListParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateSessionRequest {
    pub status: Option<String>,
    pub error_message: Option<String>,
    pub duration_seconds: Option<i64>,
    pub total_messages: Option<i64>,
}

#[derive(Deserialize)]
pub struct RecordMessageRequest {
    pub message_type: Option<String>,
    pub content: Option<String>,
    pub audio_duration_ms: Option<i64>,
    pub timestamp_ms: Option<i64>,
    pub metadata: Option<Value>,
}

fn parse_status(raw: Option<&str>) -> Result<Option<SessionStatus>, ApiError> {
    crate::api::parse_label(raw)
}

fn parse_json<T: serde::de::DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid JSON: {e}")))
}

/// Loads the session `reference` names (internal or provider id) if the
/// caller owns it. Sessions of other users, and owned sessions seen by an
/// anonymous caller, are reported as not found.
async fn owned_session(
    pool: &DbPool,
    reference: &str,
    caller: &Caller,
) -> Result<Session, ApiError> {
    let reference = reference.to_string();
    let session = with_conn(pool, move |conn| {
        murmur_sessions::find_session(conn, &reference).map_err(ApiError::from)
    })
    .await?;
    if !session.is_owned_by(caller.user_id()) {
        return Err(ApiError::NotFound("Session not found".to_string()));
    }
    Ok(session)
}

async fn session_body(
    state: &AppState,
    reference: &str,
    caller: &Caller,
) -> Result<Json<Value>, ApiError> {
    let session = owned_session(&state.pool, reference, caller).await?;
    let (session, messages) = lifecycle::session_with_messages(&state.pool, &session.id).await?;
    Ok(Json(json!({ "session": session, "messages": messages })))
}

/// POST /api/realtime/session
pub async fn create_session_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let model: ModelConfig = parse_json(&body)?;
    let created =
        lifecycle::create_session(&state, caller.user_id().map(str::to_string), model).await?;
    Ok(Json(created.into_body()))
}

/// GET /api/realtime/sessions
pub async fn list_sessions_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    let query = SessionQuery {
        user_id: caller.user_id().map(str::to_string),
        status: parse_status(params.status.as_deref())?,
        limit: params.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT),
        offset: params.offset.unwrap_or(0),
    };
    let sessions = lifecycle::list_sessions(&state.pool, query).await?;
    Ok(Json(json!({ "sessions": sessions })))
}

/// GET /api/realtime/session/{id}
pub async fn get_session_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    session_body(&state, &id, &caller).await
}

/// GET /api/realtime/session/provider/{providerSessionId}
pub async fn get_by_provider_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(provider_session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let pool = state.pool.clone();
    let reference = provider_session_id.clone();
    let session = with_conn(&pool, move |conn| {
        murmur_sessions::get_by_provider_id(conn, &reference).map_err(ApiError::from)
    })
    .await?;
    session_body(&state, &session.id, &caller).await
}

/// PATCH /api/realtime/session/{id}
pub async fn update_session_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateSessionRequest>,
) -> Result<Json<Value>, ApiError> {
    let status = parse_status(payload.status.as_deref())?;
    let session = owned_session(&state.pool, &id, &caller).await?;
    let updated = lifecycle::update_status(
        &state.pool,
        &session.id,
        status,
        payload.error_message,
        payload.duration_seconds,
        payload.total_messages,
    )
    .await?;
    Ok(Json(json!({ "session": updated })))
}

/// POST /api/realtime/session/{id}/message
pub async fn record_message_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    Json(payload): Json<RecordMessageRequest>,
) -> Result<Json<Value>, ApiError> {
    let (Some(kind), Some(timestamp_ms)) = (
        payload.message_type.as_deref().map(str::trim).filter(|k| !k.is_empty()),
        payload.timestamp_ms,
    ) else {
        return Err(ApiError::BadRequest(
            "Session ID, message type, and timestamp are required".to_string(),
        ));
    };
    let message_type: MessageType = kind
        .parse()
        .map_err(|e: murmur_types::ParseEnumError| ApiError::BadRequest(e.to_string()))?;

    let session = owned_session(&state.pool, &id, &caller).await?;
    let message = NewMessage {
        message_type,
        content: payload.content,
        audio_duration_ms: payload.audio_duration_ms,
        timestamp_ms: Some(timestamp_ms),
        metadata: payload.metadata,
    };
    let stored = lifecycle::record_message(&state.pool, &session.id, message).await?;
    Ok(Json(json!({ "message": stored })))
}

/// DELETE /api/realtime/session/{id}
pub async fn delete_session_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let session = owned_session(&state.pool, &id, &caller).await?;
    if !lifecycle::delete_session(&state.pool, &session.id).await? {
        return Err(ApiError::NotFound("Session not found".to_string()));
    }
    tracing::info!(session_id = %session.id, "session deleted");
    Ok(Json(json!({
        "success": true,
        "message": "Session deleted successfully",
    })))
}
