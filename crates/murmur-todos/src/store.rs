use crate::categories::{categorize, ensure_default_categories, get_or_create_category};
use crate::{Completion, NewTodo, Todo, TodoError, TodoFilter, TodoStatus, TodoUpdate};
use chrono::{NaiveDate, Utc};
use murmur_db::{format_timestamp, parse_timestamp};
use rusqlite::{params, Connection, OptionalExtension, Row};

const TODO_SELECT: &str = "SELECT t.id, t.user_id, t.title, t.description, t.status, t.priority,
        t.category_id, c.name, t.due_date, t.completed_at, t.created_at, t.updated_at
    FROM todos t LEFT JOIN todo_categories c ON c.id = t.category_id";

fn map_row_to_todo(row: &Row<'_>) -> rusqlite::Result<Todo> {
    let status: String = row.get(4)?;
    let priority: String = row.get(5)?;
    Ok(Todo {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: status.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?,
        priority: priority.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?,
        category_id: row.get(6)?,
        category: row.get(7)?,
        due_date: row.get(8)?,
        completed_at: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// Accepts `YYYY-MM-DD` or RFC 3339 and returns the value to store.
pub(crate) fn normalize_due_date(raw: &str) -> Result<String, TodoError> {
    let raw = raw.trim();
    if NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok() {
        return Ok(raw.to_string());
    }
    parse_timestamp(raw)
        .map(format_timestamp)
        .ok_or_else(|| TodoError::Validation(format!("invalid due date '{raw}'")))
}

fn resolve_category_id(
    conn: &Connection,
    user_id: &str,
    title: &str,
    description: Option<&str>,
    requested: Option<&str>,
) -> Result<String, TodoError> {
    ensure_default_categories(conn, user_id)?;
    let name = match requested.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name,
        None => categorize(title, description),
    };
    Ok(get_or_create_category(conn, user_id, name)?.id)
}

fn query_todos(
    conn: &Connection,
    filter: &str,
    order: &str,
    args: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Todo>, TodoError> {
    let sql = format!("{TODO_SELECT} WHERE {filter} ORDER BY {order}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(args, map_row_to_todo)?;
    let mut todos = Vec::new();
    for row in rows {
        todos.push(row?);
    }
    Ok(todos)
}

/// Creates a todo, inferring its category from the text when none is given.
pub fn create_todo(conn: &Connection, user_id: &str, new: &NewTodo) -> Result<Todo, TodoError> {
    let title = new.title.trim();
    if title.is_empty() {
        return Err(TodoError::Validation("title is required".into()));
    }
    let due_date = new.due_date.as_deref().map(normalize_due_date).transpose()?;

    let tx = conn.unchecked_transaction()?;
    let category_id = resolve_category_id(
        &tx,
        user_id,
        title,
        new.description.as_deref(),
        new.category.as_deref(),
    )?;

    let id = uuid::Uuid::new_v4().to_string();
    let now = format_timestamp(Utc::now());
    tx.execute(
        "INSERT INTO todos (
            id, user_id, title, description, status, priority, category_id,
            due_date, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            id,
            user_id,
            title,
            new.description,
            TodoStatus::Todo.as_str(),
            new.priority.unwrap_or_default().as_str(),
            category_id,
            due_date,
            now,
        ],
    )?;
    let todo = get_todo(&tx, user_id, &id)?;
    tx.commit()?;

    tracing::debug!(user_id, todo_id = %id, "todo created");
    Ok(todo)
}

pub fn get_todo(conn: &Connection, user_id: &str, id: &str) -> Result<Todo, TodoError> {
    let sql = format!("{TODO_SELECT} WHERE t.id = ?1 AND t.user_id = ?2");
    conn.query_row(&sql, params![id, user_id], map_row_to_todo)
        .optional()?
        .ok_or_else(|| TodoError::NotFound(id.to_string()))
}

/// Lists a user's todos, newest first.
pub fn list_todos(
    conn: &Connection,
    user_id: &str,
    filter: &TodoFilter,
) -> Result<Vec<Todo>, TodoError> {
    let status = filter.status.map(|s| s.as_str());
    let category = filter.category.as_deref().map(str::trim);
    let category_id = filter.category_id.as_deref();
    query_todos(
        conn,
        "t.user_id = ?1
            AND (?2 IS NULL OR t.status = ?2)
            AND (?3 IS NULL OR c.name = ?3 COLLATE NOCASE)
            AND (?4 IS NULL OR t.category_id = ?4)",
        "t.created_at DESC, t.id ASC",
        &[&user_id, &status, &category, &category_id],
    )
}

/// Applies a partial update in one transaction.
///
/// Moving a todo to `done` stamps `completed_at`; moving it out of `done`
/// clears it. A category named in the update is only created if the todo
/// exists.
pub fn update_todo(
    conn: &Connection,
    user_id: &str,
    id: &str,
    update: &TodoUpdate,
) -> Result<Todo, TodoError> {
    if update.is_empty() {
        return get_todo(conn, user_id, id);
    }

    let tx = conn.unchecked_transaction()?;
    let mut set_parts: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(title) = &update.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(TodoError::Validation("title must not be empty".into()));
        }
        values.push(Box::new(title.to_string()));
        set_parts.push(format!("title = ?{}", values.len()));
    }
    if let Some(description) = &update.description {
        values.push(Box::new(description.clone()));
        set_parts.push(format!("description = ?{}", values.len()));
    }
    if let Some(priority) = update.priority {
        values.push(Box::new(priority.as_str()));
        set_parts.push(format!("priority = ?{}", values.len()));
    }
    if let Some(due_date) = &update.due_date {
        values.push(Box::new(normalize_due_date(due_date)?));
        set_parts.push(format!("due_date = ?{}", values.len()));
    }
    if let Some(category) = &update.category {
        let category = get_or_create_category(&tx, user_id, category)?;
        values.push(Box::new(category.id));
        set_parts.push(format!("category_id = ?{}", values.len()));
    }
    let now = format_timestamp(Utc::now());
    if let Some(status) = update.status {
        values.push(Box::new(status.as_str()));
        set_parts.push(format!("status = ?{}", values.len()));
        let completed_at = (status == TodoStatus::Done).then(|| now.clone());
        values.push(Box::new(completed_at));
        set_parts.push(format!("completed_at = ?{}", values.len()));
    }
    values.push(Box::new(now));
    set_parts.push(format!("updated_at = ?{}", values.len()));

    values.push(Box::new(id.to_string()));
    let id_idx = values.len();
    values.push(Box::new(user_id.to_string()));
    let user_idx = values.len();

    let sql = format!(
        "UPDATE todos SET {} WHERE id = ?{id_idx} AND user_id = ?{user_idx}",
        set_parts.join(", ")
    );
    let params: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    if tx.execute(&sql, params.as_slice())? == 0 {
        return Err(TodoError::NotFound(id.to_string()));
    }
    let todo = get_todo(&tx, user_id, id)?;
    tx.commit()?;
    Ok(todo)
}

/// Marks a todo as done by id. A todo that is already done is returned
/// unchanged.
pub fn complete_todo(conn: &Connection, user_id: &str, id: &str) -> Result<Todo, TodoError> {
    let todo = get_todo(conn, user_id, id)?;
    if todo.status == TodoStatus::Done {
        return Ok(todo);
    }
    update_todo(
        conn,
        user_id,
        id,
        &TodoUpdate {
            status: Some(TodoStatus::Done),
            ..TodoUpdate::default()
        },
    )
}

/// Completes the first open todo whose title contains `fragment`
/// (case-insensitive).
///
/// Candidates are ordered oldest first (`created_at`, then `id`); the first
/// one is completed and the titles of the rest are returned so the caller
/// can ask the user to disambiguate.
pub fn complete_matching(
    conn: &Connection,
    user_id: &str,
    fragment: &str,
) -> Result<Completion, TodoError> {
    let needle = fragment.trim().to_lowercase();
    if needle.is_empty() {
        return Err(TodoError::Validation("a todo_id or title is required".into()));
    }

    let open = query_todos(
        conn,
        "t.user_id = ?1 AND t.status != 'done'",
        "t.created_at ASC, t.id ASC",
        &[&user_id],
    )?;
    let mut matches = open
        .into_iter()
        .filter(|todo| todo.title.to_lowercase().contains(&needle));

    let first = matches
        .next()
        .ok_or_else(|| TodoError::NoMatch(fragment.trim().to_string()))?;
    let other_matches = matches.map(|todo| todo.title).collect();

    let todo = complete_todo(conn, user_id, &first.id)?;
    tracing::debug!(user_id, todo_id = %todo.id, "todo completed by title");
    Ok(Completion {
        todo,
        other_matches,
    })
}

/// Deletes a todo. Returns `false` if it did not exist.
pub fn delete_todo(conn: &Connection, user_id: &str, id: &str) -> Result<bool, TodoError> {
    let deleted = conn.execute(
        "DELETE FROM todos WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    Ok(deleted > 0)
}
