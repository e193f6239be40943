//! Todo categories and keyword-based auto-categorization.

use crate::{Category, CategoryUpdate, TodoError};
use chrono::Utc;
use murmur_db::format_timestamp;
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Categories every user starts with, and their display colors.
pub const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("Work", "#3b82f6"),
    ("Grocery", "#22c55e"),
    ("Learning", "#a855f7"),
    ("Personal", "#f59e0b"),
    ("Others", "#6b7280"),
];

/// Category used when no keyword group matches.
pub const FALLBACK_CATEGORY: &str = "Others";

/// Keyword groups, checked in this order.
const KEYWORD_GROUPS: &[(&str, &[&str])] = &[
    (
        "Work",
        &[
            "work", "meeting", "meetings", "report", "reports", "client", "clients", "project",
            "deadline", "presentation", "office", "boss", "colleague", "email", "invoice",
            "proposal", "review", "standup", "sprint",
        ],
    ),
    (
        "Grocery",
        &[
            "buy", "grocery", "groceries", "milk", "eggs", "bread", "butter", "cheese", "fruit",
            "fruits", "vegetables", "supermarket", "shopping", "store", "rice", "coffee", "meat",
        ],
    ),
    (
        "Learning",
        &[
            "learn", "study", "read", "course", "lesson", "tutorial", "practice", "book",
            "homework", "research", "exam", "lecture",
        ],
    ),
    (
        "Personal",
        &[
            "call", "gym", "doctor", "dentist", "birthday", "family", "mom", "dad", "friend",
            "friends", "home", "clean", "laundry", "appointment", "exercise", "haircut", "pay",
        ],
    ),
];

/// Picks a category name for a todo from its title and description.
///
/// Matches whole words only, case-insensitively; the first group with any
/// hit wins.
pub fn categorize(title: &str, description: Option<&str>) -> &'static str {
    let text = format!("{title} {}", description.unwrap_or_default()).to_lowercase();
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    KEYWORD_GROUPS
        .iter()
        .find(|(_, keywords)| words.iter().any(|w| keywords.contains(w)))
        .map(|(name, _)| *name)
        .unwrap_or(FALLBACK_CATEGORY)
}

fn map_row_to_category(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        color: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn insert_category(
    conn: &Connection,
    user_id: &str,
    name: &str,
    color: Option<&str>,
) -> Result<(), TodoError> {
    conn.execute(
        "INSERT OR IGNORE INTO todo_categories (id, user_id, name, color, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            uuid::Uuid::new_v4().to_string(),
            user_id,
            name,
            color,
            format_timestamp(Utc::now()),
        ],
    )?;
    Ok(())
}

/// Creates any missing default categories for `user_id`.
pub fn ensure_default_categories(conn: &Connection, user_id: &str) -> Result<(), TodoError> {
    for (name, color) in DEFAULT_CATEGORIES {
        insert_category(conn, user_id, name, Some(color))?;
    }
    Ok(())
}

/// Lists a user's categories by name.
pub fn list_categories(conn: &Connection, user_id: &str) -> Result<Vec<Category>, TodoError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, color, created_at FROM todo_categories
        WHERE user_id = ?1 ORDER BY name ASC",
    )?;
    let rows = stmt.query_map([user_id], map_row_to_category)?;
    let mut categories = Vec::new();
    for row in rows {
        categories.push(row?);
    }
    Ok(categories)
}

/// Finds a category by name, case-insensitively.
pub fn find_category(
    conn: &Connection,
    user_id: &str,
    name: &str,
) -> Result<Option<Category>, TodoError> {
    Ok(conn
        .query_row(
            "SELECT id, user_id, name, color, created_at FROM todo_categories
            WHERE user_id = ?1 AND name = ?2",
            params![user_id, name.trim()],
            map_row_to_category,
        )
        .optional()?)
}

/// Returns the named category, creating it if the user does not have it.
pub fn get_or_create_category(
    conn: &Connection,
    user_id: &str,
    name: &str,
) -> Result<Category, TodoError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TodoError::Validation("category name must not be empty".into()));
    }
    if let Some(existing) = find_category(conn, user_id, name)? {
        return Ok(existing);
    }
    insert_category(conn, user_id, name, None)?;
    tracing::debug!(user_id, category = name, "category created");
    find_category(conn, user_id, name)?.ok_or_else(|| TodoError::NotFound(name.to_string()))
}

const CATEGORY_COLUMNS: &str = "id, user_id, name, color, created_at";

fn required_name(name: &str) -> Result<&str, TodoError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TodoError::Validation("category name must not be empty".into()));
    }
    Ok(name)
}

pub fn get_category(conn: &Connection, user_id: &str, id: &str) -> Result<Category, TodoError> {
    let sql = format!("SELECT {CATEGORY_COLUMNS} FROM todo_categories WHERE id = ?1 AND user_id = ?2");
    conn.query_row(&sql, params![id, user_id], map_row_to_category)
        .optional()?
        .ok_or_else(|| TodoError::NotFound(id.to_string()))
}

/// Creates a category. Names are unique per user, ignoring case.
pub fn create_category(
    conn: &Connection,
    user_id: &str,
    name: &str,
    color: Option<&str>,
) -> Result<Category, TodoError> {
    let name = required_name(name)?;
    let tx = conn.unchecked_transaction()?;
    if find_category(&tx, user_id, name)?.is_some() {
        return Err(TodoError::DuplicateCategory(name.to_string()));
    }
    insert_category(&tx, user_id, name, color)?;
    let category = find_category(&tx, user_id, name)?
        .ok_or_else(|| TodoError::NotFound(name.to_string()))?;
    tx.commit()?;
    tracing::debug!(user_id, category = name, "category created");
    Ok(category)
}

/// Renames or recolors a category. Renaming onto another category's name
/// is rejected.
pub fn update_category(
    conn: &Connection,
    user_id: &str,
    id: &str,
    update: &CategoryUpdate,
) -> Result<Category, TodoError> {
    let tx = conn.unchecked_transaction()?;
    let current = get_category(&tx, user_id, id)?;
    let name = match update.name.as_deref() {
        Some(name) => required_name(name)?,
        None => current.name.as_str(),
    };
    if let Some(other) = find_category(&tx, user_id, name)? {
        if other.id != current.id {
            return Err(TodoError::DuplicateCategory(name.to_string()));
        }
    }
    let color = update.color.as_deref().or(current.color.as_deref());
    tx.execute(
        "UPDATE todo_categories SET name = ?1, color = ?2 WHERE id = ?3 AND user_id = ?4",
        params![name, color, id, user_id],
    )?;
    let category = get_category(&tx, user_id, id)?;
    tx.commit()?;
    Ok(category)
}

/// Deletes a category; its todos become uncategorized. Returns `false` if
/// it did not exist.
pub fn delete_category(conn: &Connection, user_id: &str, id: &str) -> Result<bool, TodoError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE todos SET category_id = NULL WHERE category_id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    let deleted = tx.execute(
        "DELETE FROM todo_categories WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    tx.commit()?;
    Ok(deleted > 0)
}
