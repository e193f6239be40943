//! `set_mode` and `select_account`: the tools that reshape the tool set.

use super::Args;
use crate::api::ApiError;
use crate::lifecycle::{self, ToolUpdate};
use murmur_db::DbPool;
use serde_json::{json, Value};

fn response(update: ToolUpdate) -> Value {
    let mut body = json!({
        "success": true,
        "mode": update.mode,
        "granted_mode": update.granted_mode,
        "tools": update.tools,
        "active_tools": update.active_tools,
        "update_session": true,
        "changed": update.changed,
    });
    if let Some(email) = update.selected_account {
        body["selected_account"] = Value::String(email);
    }
    if update.granted_mode != update.mode {
        body["message"] = Value::String(format!(
            "{} mode needs a connected Google account; connect one in settings",
            update.mode
        ));
    }
    body
}

pub async fn set_mode(
    pool: &DbPool,
    session_id: &str,
    caller: Option<&str>,
    args: &Args,
) -> Result<Value, ApiError> {
    let mode = args.required("mode")?;
    lifecycle::switch_mode(pool, session_id, caller, mode)
        .await
        .map(response)
}

pub async fn select_account(
    pool: &DbPool,
    session_id: &str,
    user_id: &str,
    args: &Args,
) -> Result<Value, ApiError> {
    let email = args.required("email")?;
    lifecycle::select_account(pool, session_id, user_id, email)
        .await
        .map(response)
}
