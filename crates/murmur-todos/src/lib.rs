//! Todo list storage.
//!
//! Todos belong to a user and to one of that user's categories. When a todo
//! is created without a category, one is picked from keywords in its text
//! (see [`categories::categorize`]). Completion by spoken title fragment is
//! supported through [`complete_matching`], which always picks the same todo
//! for the same list and reports the other candidates.

pub mod categories;
mod model;
mod stats;
mod store;

pub use categories::{
    categorize, create_category, delete_category, ensure_default_categories, get_category,
    get_or_create_category, list_categories, update_category, DEFAULT_CATEGORIES,
};
pub use model::{
    Category, CategoryUpdate, Completion, NewTodo, Priority, Todo, TodoFilter, TodoStatus,
    TodoUpdate,
};
pub use stats::{todo_stats, TodoStats};
pub use store::{
    complete_matching, complete_todo, create_todo, delete_todo, get_todo, list_todos, update_todo,
};

use thiserror::Error;

/// Errors that can occur during todo operations.
#[derive(Debug, Error)]
pub enum TodoError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("todo not found: {0}")]
    NotFound(String),
    /// No open todo's title contains the spoken fragment.
    #[error("no open todo matching '{0}'")]
    NoMatch(String),
    #[error("category already exists: {0}")]
    DuplicateCategory(String),
    #[error("invalid todo: {0}")]
    Validation(String),
}
