//! Todo list and category management for the signed-in user.
//!
//! The same stores back `todo_actions`; these routes serve the todo page,
//! which has no voice session to name.

use crate::api::{caller_id, parse_label, ApiError};
use crate::middleware::Caller;
use crate::{with_conn, AppState};
use axum::{
    extract::{Extension, Path, Query},
    response::Json,
};
use murmur_todos::{Category, CategoryUpdate, NewTodo, TodoError, TodoFilter, TodoUpdate};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Deserialize)]
pub struct TodoListParams {
    pub status: Option<String>,
    pub category: Option<String>,
    pub category_id: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateTodoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
    pub due_date: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateTodoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
    pub due_date: Option<String>,
}

#[derive(Deserialize)]
pub struct CategoryRequest {
    pub name: Option<String>,
    pub color: Option<String>,
}

fn category_error(err: TodoError) -> ApiError {
    match err {
        TodoError::NotFound(_) => ApiError::NotFound("Category not found".to_string()),
        other => other.into(),
    }
}

fn seeded_categories(conn: &Connection, user: &str) -> Result<Vec<Category>, TodoError> {
    murmur_todos::ensure_default_categories(conn, user)?;
    murmur_todos::list_categories(conn, user)
}

/// GET /api/todos
pub async fn list_todos_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Query(params): Query<TodoListParams>,
) -> Result<Json<Value>, ApiError> {
    let user = caller_id(&caller)?;
    let filter = TodoFilter {
        status: parse_label(params.status.as_deref())?,
        category: params.category.filter(|c| !c.trim().is_empty()),
        category_id: params.category_id.filter(|c| !c.trim().is_empty()),
    };
    let todos = with_conn(&state.pool, move |conn| {
        murmur_todos::list_todos(conn, &user, &filter).map_err(ApiError::from)
    })
    .await?;
    Ok(Json(json!({ "count": todos.len(), "todos": todos })))
}

/// POST /api/todos
pub async fn create_todo_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<CreateTodoRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = caller_id(&caller)?;
    let new = NewTodo {
        title: payload
            .title
            .ok_or_else(|| ApiError::BadRequest("Title is required".to_string()))?,
        description: payload.description,
        priority: parse_label(payload.priority.as_deref())?,
        category: payload.category,
        due_date: payload.due_date,
    };
    let todo = with_conn(&state.pool, move |conn| {
        murmur_todos::create_todo(conn, &user, &new).map_err(ApiError::from)
    })
    .await?;
    tracing::info!(todo_id = %todo.id, "todo created");
    Ok(Json(json!({ "success": true, "todo": todo })))
}

/// GET /api/todos/{id}
pub async fn get_todo_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = caller_id(&caller)?;
    let todo = with_conn(&state.pool, move |conn| {
        murmur_todos::get_todo(conn, &user, &id).map_err(ApiError::from)
    })
    .await?;
    Ok(Json(json!({ "todo": todo })))
}

/// PATCH /api/todos/{id}
pub async fn update_todo_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateTodoRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = caller_id(&caller)?;
    let update = TodoUpdate {
        title: payload.title,
        description: payload.description,
        status: parse_label(payload.status.as_deref())?,
        priority: parse_label(payload.priority.as_deref())?,
        category: payload.category,
        due_date: payload.due_date,
    };
    let todo = with_conn(&state.pool, move |conn| {
        murmur_todos::update_todo(conn, &user, &id, &update).map_err(ApiError::from)
    })
    .await?;
    Ok(Json(json!({ "success": true, "todo": todo })))
}

/// POST /api/todos/{id}/complete
pub async fn complete_todo_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = caller_id(&caller)?;
    let todo = with_conn(&state.pool, move |conn| {
        murmur_todos::complete_todo(conn, &user, &id).map_err(ApiError::from)
    })
    .await?;
    Ok(Json(json!({ "success": true, "todo": todo })))
}

/// DELETE /api/todos/{id}
pub async fn delete_todo_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = caller_id(&caller)?;
    let deleted = with_conn(&state.pool, move |conn| {
        murmur_todos::delete_todo(conn, &user, &id).map_err(ApiError::from)
    })
    .await?;
    if !deleted {
        return Err(ApiError::NotFound("Todo not found".to_string()));
    }
    Ok(Json(json!({ "success": true, "message": "Todo deleted successfully" })))
}

/// GET /api/todos/stats
pub async fn todo_stats_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Value>, ApiError> {
    let user = caller_id(&caller)?;
    let stats = with_conn(&state.pool, move |conn| {
        murmur_todos::todo_stats(conn, &user).map_err(ApiError::from)
    })
    .await?;
    Ok(Json(json!({ "stats": stats })))
}

/// GET /api/todos/categories
///
/// A user who has never created a todo still sees the default categories.
pub async fn list_categories_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Value>, ApiError> {
    let user = caller_id(&caller)?;
    let categories = with_conn(&state.pool, move |conn| {
        seeded_categories(conn, &user).map_err(ApiError::from)
    })
    .await?;
    Ok(Json(json!({ "categories": categories })))
}

/// POST /api/todos/categories
pub async fn create_category_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<CategoryRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = caller_id(&caller)?;
    let name = payload
        .name
        .ok_or_else(|| ApiError::BadRequest("Category name is required".to_string()))?;
    let color = payload.color;
    let category = with_conn(&state.pool, move |conn| {
        murmur_todos::create_category(conn, &user, &name, color.as_deref()).map_err(category_error)
    })
    .await?;
    Ok(Json(json!({ "success": true, "category": category })))
}

/// PUT /api/todos/categories/{id}
pub async fn update_category_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    Json(payload): Json<CategoryRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = caller_id(&caller)?;
    let update = CategoryUpdate {
        name: payload.name,
        color: payload.color,
    };
    let category = with_conn(&state.pool, move |conn| {
        murmur_todos::update_category(conn, &user, &id, &update).map_err(category_error)
    })
    .await?;
    Ok(Json(json!({ "success": true, "category": category })))
}

/// DELETE /api/todos/categories/{id}
pub async fn delete_category_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = caller_id(&caller)?;
    let deleted = with_conn(&state.pool, move |conn| {
        murmur_todos::delete_category(conn, &user, &id).map_err(category_error)
    })
    .await?;
    if !deleted {
        return Err(ApiError::NotFound("Category not found".to_string()));
    }
    Ok(Json(json!({ "success": true, "message": "Category deleted successfully" })))
}
