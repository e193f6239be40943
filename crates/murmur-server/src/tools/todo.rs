//! `todo_actions` on the caller's todo list.

use super::{Args, ToolContext};
use crate::api::ApiError;
use crate::with_conn;
use murmur_todos::{NewTodo, TodoFilter, TodoUpdate};
use rusqlite::Connection;
use serde_json::{json, Value};

pub async fn execute(ctx: &ToolContext, action: &str, args: &Args) -> Result<Value, ApiError> {
    let user = ctx.user()?.to_string();
    let args = args.clone();
    let action = action.to_string();
    with_conn(&ctx.pool, move |conn| run(conn, &user, &action, &args)).await
}

fn run(conn: &Connection, user: &str, action: &str, args: &Args) -> Result<Value, ApiError> {
    match action {
        "list" => {
            let filter = TodoFilter {
                status: args.parsed("status")?,
                category: args.string("category"),
                category_id: args.string("category_id"),
            };
            let todos = murmur_todos::list_todos(conn, user, &filter)?;
            Ok(json!({ "success": true, "count": todos.len(), "todos": todos }))
        }
        "create" => {
            let new = NewTodo {
                title: args.required("title")?.to_string(),
                description: args.string("description"),
                priority: args.parsed("priority")?,
                category: args.string("category"),
                due_date: args.string("due_date"),
            };
            let todo = murmur_todos::create_todo(conn, user, &new)?;
            Ok(json!({ "success": true, "todo": todo }))
        }
        "update" => {
            let id = args.required("todo_id")?;
            let update = TodoUpdate {
                title: args.string("title"),
                description: args.string("description"),
                status: args.parsed("status")?,
                priority: args.parsed("priority")?,
                category: args.string("category"),
                due_date: args.string("due_date"),
            };
            let todo = murmur_todos::update_todo(conn, user, id, &update)?;
            Ok(json!({ "success": true, "todo": todo }))
        }
        "complete" => match args.str("todo_id") {
            Some(id) => {
                let todo = murmur_todos::complete_todo(conn, user, id)?;
                Ok(json!({ "success": true, "todo": todo, "other_matches": [] }))
            }
            None => {
                // Spoken completion: first open todo whose title contains the fragment.
                let fragment = args.str("title").unwrap_or_default();
                let completion = murmur_todos::complete_matching(conn, user, fragment)?;
                Ok(json!({
                    "success": true,
                    "todo": completion.todo,
                    "other_matches": completion.other_matches,
                }))
            }
        },
        "delete" => {
            let id = args.required("todo_id")?;
            if !murmur_todos::delete_todo(conn, user, id)? {
                return Err(ApiError::NotFound("Todo not found".to_string()));
            }
            Ok(json!({ "success": true, "deleted": id }))
        }
        "stats" => {
            let stats = murmur_todos::todo_stats(conn, user)?;
            Ok(json!({ "success": true, "stats": stats }))
        }
        other => Err(ApiError::BadRequest(format!(
            "unknown action '{other}' for todo_actions"
        ))),
    }
}
