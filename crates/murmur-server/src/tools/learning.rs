//! `learning_actions`: topics, study sessions and progress.

use super::{Args, ToolContext};
use crate::api::ApiError;
use crate::with_conn;
use murmur_learning::{LearningTopic, NewTopic, ProgressUpdate, TopicFilter, TopicUpdate};
use rusqlite::Connection;
use serde_json::{json, Value};

pub async fn execute(ctx: &ToolContext, action: &str, args: &Args) -> Result<Value, ApiError> {
    let user = ctx.user()?.to_string();
    let args = args.clone();
    let action = action.to_string();
    with_conn(&ctx.pool, move |conn| run(conn, &user, &action, &args)).await
}

/// The topic named by `topic_id`, or else the first whose title matches `title`.
fn lookup(conn: &Connection, user: &str, args: &Args) -> Result<LearningTopic, ApiError> {
    if let Some(id) = args.str("topic_id") {
        return Ok(murmur_learning::get_topic(conn, user, id)?);
    }
    match args.str("title") {
        Some(title) => Ok(murmur_learning::find_topic_by_title(conn, user, title)?),
        None => Err(ApiError::BadRequest("topic_id or title is required".to_string())),
    }
}

fn run(conn: &Connection, user: &str, action: &str, args: &Args) -> Result<Value, ApiError> {
    match action {
        "list_topics" => {
            let filter = TopicFilter {
                status: args.parsed("status")?,
                category: args.string("category"),
                ..TopicFilter::default()
            };
            let topics = murmur_learning::list_topics(conn, user, &filter)?;
            Ok(json!({ "success": true, "count": topics.len(), "topics": topics }))
        }
        "create_topic" => {
            let new = NewTopic {
                title: args.required("title")?.to_string(),
                description: args.string("description"),
                category: args.string("category"),
                difficulty: args.parsed("difficulty")?,
            };
            let topic = murmur_learning::create_topic(conn, user, &new)?;
            Ok(json!({ "success": true, "topic": topic }))
        }
        "get_topic" => {
            let topic = lookup(conn, user, args)?;
            Ok(json!({ "success": true, "topic": topic }))
        }
        "update_topic" => {
            let id = args.required("topic_id")?;
            let update = TopicUpdate {
                title: args.string("title"),
                description: args.string("description"),
                category: args.string("category"),
                difficulty: args.parsed("difficulty")?,
                status: args.parsed("status")?,
                progress_percentage: args.int("progress_percentage"),
                next_steps: args.string("next_steps"),
            };
            let topic = murmur_learning::update_topic(conn, user, id, &update)?;
            Ok(json!({ "success": true, "topic": topic }))
        }
        "delete_topic" => {
            let id = args.required("topic_id")?;
            if !murmur_learning::delete_topic(conn, user, id)? {
                return Err(ApiError::NotFound("Learning topic not found".to_string()));
            }
            Ok(json!({ "success": true, "deleted": id }))
        }
        "continue_topic" => {
            let topic = lookup(conn, user, args)?;
            let resumed = murmur_learning::continue_topic(conn, user, &topic.id)?;
            Ok(json!({
                "success": true,
                "session_number": resumed.session.session_number,
                "last_summary": resumed.topic.last_summary,
                "next_steps": resumed.topic.next_steps,
                "progress_percentage": resumed.topic.progress_percentage,
                "concepts_covered": resumed.topic.concepts_covered,
                "topic": resumed.topic,
                "session": resumed.session,
            }))
        }
        "save_progress" => {
            let topic = lookup(conn, user, args)?;
            let update = ProgressUpdate {
                summary: args.string("summary"),
                concepts: args.list("concepts"),
                next_steps: args.string("next_steps"),
                progress_percentage: args.int("progress_percentage"),
            };
            let saved = murmur_learning::save_progress(conn, user, &topic.id, &update)?;
            Ok(json!({
                "success": true,
                "new_concepts": saved.new_concepts,
                "topic": saved.topic,
                "session": saved.session,
            }))
        }
        "stats" => {
            let stats = murmur_learning::learning_stats(conn, user)?;
            Ok(json!({ "success": true, "stats": stats }))
        }
        other => Err(ApiError::BadRequest(format!(
            "unknown action '{other}' for learning_actions"
        ))),
    }
}
