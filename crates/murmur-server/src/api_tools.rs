//! `POST /api/tools/{toolName}`.

use crate::api::ApiError;
use crate::dispatch::{self, DispatchError, ToolRequest};
use crate::middleware::Caller;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Extension, Path},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::sync::Arc;

/// Parses the invocation body and hands it to the dispatcher.
///
/// An empty body is treated as `{}` so the dispatcher reports the missing
/// session reference instead of a parse error.
pub async fn invoke_tool_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(tool_name): Path<String>,
    body: Bytes,
) -> Response {
    let value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => value,
            Err(e) => {
                return DispatchError::from(ApiError::BadRequest(format!("invalid JSON: {e}")))
                    .into_response()
            }
        }
    };

    let request = match ToolRequest::from_body(value) {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };

    tracing::debug!(tool = %tool_name, action = ?request.action, "tool invocation");
    match dispatch::dispatch(&state, &caller, &tool_name, request).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => {
            tracing::info!(tool = %tool_name, status = %e.status(), error = %e, "tool invocation refused");
            e.into_response()
        }
    }
}
