//! `calendar_actions` on the selected account's primary calendar.

use super::{Args, ToolContext};
use crate::api::ApiError;
use chrono::{DateTime, Duration, Utc};
use murmur_google::NewEvent;
use serde_json::{json, Value};

const DEFAULT_WINDOW_DAYS: i64 = 7;

fn instant(args: &Args, key: &str) -> Result<Option<DateTime<Utc>>, ApiError> {
    args.str(key)
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|_| ApiError::BadRequest(format!("{key} must be an RFC 3339 timestamp")))
        })
        .transpose()
}

pub async fn execute(ctx: &ToolContext, action: &str, args: &Args) -> Result<Value, ApiError> {
    let token = ctx.account()?.access_token.as_str();

    match action {
        "list" => {
            // Default window: now through the next week.
            let time_min = instant(args, "time_min")?.unwrap_or_else(Utc::now);
            let time_max = instant(args, "time_max")?
                .unwrap_or_else(|| time_min + Duration::days(DEFAULT_WINDOW_DAYS));
            let max = args.int("max_results").unwrap_or(10).clamp(1, 50) as u32;
            let events = ctx
                .calendar
                .list_events(token, Some(time_min), Some(time_max), max)
                .await?;
            Ok(json!({ "success": true, "count": events.len(), "events": events }))
        }
        "create" => {
            // Validated in full before the provider is called.
            let event = NewEvent::parse(
                args.str("summary"),
                args.str("start"),
                args.str("end"),
                args.string("description"),
                args.string("location"),
                args.list("attendees"),
            )?;
            let created = ctx.calendar.create_event(token, &event).await?;
            tracing::info!(session_id = %ctx.session.id, event_id = %created.id, "calendar event created");
            Ok(json!({ "success": true, "event": created }))
        }
        "delete" => {
            let event_id = args.required("event_id")?;
            ctx.calendar.delete_event(token, event_id).await?;
            Ok(json!({ "success": true, "deleted": event_id }))
        }
        other => Err(ApiError::BadRequest(format!(
            "unknown action '{other}' for calendar_actions"
        ))),
    }
}
