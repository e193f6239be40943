//! `email_actions` on the selected account's mailbox.

use super::{Args, ToolContext};
use crate::api::ApiError;
use murmur_google::{build_reply, OutgoingMessage};
use serde_json::{json, Value};

const DEFAULT_MAX_RESULTS: i64 = 10;
const MAX_RESULTS_CAP: i64 = 50;

fn max_results(args: &Args) -> u32 {
    args.int("max_results")
        .unwrap_or(DEFAULT_MAX_RESULTS)
        .clamp(1, MAX_RESULTS_CAP) as u32
}

fn compose(args: &Args) -> Result<OutgoingMessage, ApiError> {
    let mut message = OutgoingMessage::new(
        args.list("to"),
        args.string("subject").unwrap_or_default(),
        args.string("body").unwrap_or_default(),
    );
    message.cc = args.list("cc");
    message.validate()?;
    Ok(message)
}

pub async fn execute(ctx: &ToolContext, action: &str, args: &Args) -> Result<Value, ApiError> {
    let account = ctx.account()?;
    let token = account.access_token.as_str();
    let mail = &ctx.mail;

    match action {
        "search" => {
            let query = args.str("query").unwrap_or("in:inbox");
            let messages = mail.search(token, query, max_results(args)).await?;
            Ok(json!({ "success": true, "count": messages.len(), "messages": messages }))
        }
        "get" => {
            let message = mail.get_message(token, args.required("message_id")?).await?;
            Ok(json!({ "success": true, "message": message }))
        }
        "summary" => {
            let unread = mail
                .search(token, "is:unread in:inbox", max_results(args))
                .await?;
            Ok(json!({
                "success": true,
                "account": account.email,
                "unread_count": unread.len(),
                "messages": unread,
            }))
        }
        "draft" => {
            let draft = mail.create_draft(token, &compose(args)?).await?;
            Ok(json!({ "success": true, "draft": draft }))
        }
        "send" => {
            let sent = mail.send(token, &compose(args)?).await?;
            tracing::info!(session_id = %ctx.session.id, message_id = %sent.id, "email sent");
            Ok(json!({ "success": true, "sent": sent }))
        }
        "reply" => {
            let original_id = args.required("message_id")?;
            let body = args.required("body")?;
            let original = mail.get_message(token, original_id).await?;
            let reply = build_reply(&original, &account.email, body, args.flag("reply_all"));
            reply.validate()?;
            let sent = mail.send(token, &reply).await?;
            tracing::info!(
                session_id = %ctx.session.id,
                thread_id = %sent.thread_id,
                reply_all = args.flag("reply_all"),
                "email reply sent"
            );
            Ok(json!({
                "success": true,
                "sent": sent,
                "to": reply.to,
                "cc": reply.cc,
                "subject": reply.subject,
            }))
        }
        "list_drafts" => {
            let drafts = mail.list_drafts(token, max_results(args)).await?;
            Ok(json!({ "success": true, "count": drafts.len(), "drafts": drafts }))
        }
        "update_draft" => {
            let draft_id = args.required("draft_id")?;
            let draft = mail.update_draft(token, draft_id, &compose(args)?).await?;
            Ok(json!({ "success": true, "draft": draft }))
        }
        "delete_draft" => {
            let draft_id = args.required("draft_id")?;
            mail.delete_draft(token, draft_id).await?;
            Ok(json!({ "success": true, "deleted": draft_id }))
        }
        "send_draft" => {
            let sent = mail.send_draft(token, args.required("draft_id")?).await?;
            Ok(json!({ "success": true, "sent": sent }))
        }
        other => Err(ApiError::BadRequest(format!(
            "unknown action '{other}' for email_actions"
        ))),
    }
}
