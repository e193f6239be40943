//! Learning topics and their study sessions for the signed-in user.

use crate::api::{caller_id, parse_label, ApiError};
use crate::middleware::Caller;
use crate::{with_conn, AppState};
use axum::{
    extract::{Extension, Path, Query},
    response::Json,
};
use murmur_learning::{LearningError, LearningSession, LearningTopic, NewTopic, TopicFilter, TopicUpdate};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Default page size for topic and study-session listings.
const DEFAULT_LIST_LIMIT: u32 = 10;
const MAX_LIST_LIMIT: u32 = 100;
/// Study sessions returned alongside a single topic.
const TOPIC_DETAIL_SESSIONS: u32 = 10;

#[derive(Deserialize)]
pub struct TopicListParams {
    pub status: Option<String>,
    pub category: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Deserialize)]
pub struct PageParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Deserialize)]
pub struct CreateTopicRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub difficulty: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateTopicRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub status: Option<String>,
    pub progress_percentage: Option<i64>,
    pub next_steps: Option<String>,
}

fn page_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

fn topic_with_sessions(
    conn: &Connection,
    user: &str,
    id: &str,
) -> Result<(LearningTopic, Vec<LearningSession>), LearningError> {
    let topic = murmur_learning::get_topic(conn, user, id)?;
    let sessions = murmur_learning::list_sessions(conn, user, id, TOPIC_DETAIL_SESSIONS, 0)?;
    Ok((topic, sessions))
}

/// GET /api/learning/topics
pub async fn list_topics_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Query(params): Query<TopicListParams>,
) -> Result<Json<Value>, ApiError> {
    let user = caller_id(&caller)?;
    let filter = TopicFilter {
        status: parse_label(params.status.as_deref())?,
        category: params.category.filter(|c| !c.trim().is_empty()),
        limit: Some(page_limit(params.limit)),
        offset: params.offset.unwrap_or(0),
    };
    let topics = with_conn(&state.pool, move |conn| {
        murmur_learning::list_topics(conn, &user, &filter).map_err(ApiError::from)
    })
    .await?;
    Ok(Json(json!({ "count": topics.len(), "topics": topics })))
}

/// POST /api/learning/topics
pub async fn create_topic_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<CreateTopicRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = caller_id(&caller)?;
    let new = NewTopic {
        title: payload
            .title
            .ok_or_else(|| ApiError::BadRequest("Title is required".to_string()))?,
        description: payload.description,
        category: payload.category,
        difficulty: parse_label(payload.difficulty.as_deref())?,
    };
    let topic = with_conn(&state.pool, move |conn| {
        murmur_learning::create_topic(conn, &user, &new).map_err(ApiError::from)
    })
    .await?;
    tracing::info!(topic_id = %topic.id, "learning topic created");
    Ok(Json(json!({ "success": true, "topic": topic })))
}

/// GET /api/learning/topics/{id}
///
/// The topic with its most recent study sessions.
pub async fn get_topic_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = caller_id(&caller)?;
    let (topic, sessions) = with_conn(&state.pool, move |conn| {
        topic_with_sessions(conn, &user, &id).map_err(ApiError::from)
    })
    .await?;
    Ok(Json(json!({ "topic": topic, "sessions": sessions })))
}

/// PATCH /api/learning/topics/{id}
pub async fn update_topic_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateTopicRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = caller_id(&caller)?;
    let update = TopicUpdate {
        title: payload.title,
        description: payload.description,
        category: payload.category,
        difficulty: parse_label(payload.difficulty.as_deref())?,
        status: parse_label(payload.status.as_deref())?,
        progress_percentage: payload.progress_percentage,
        next_steps: payload.next_steps,
    };
    let topic = with_conn(&state.pool, move |conn| {
        murmur_learning::update_topic(conn, &user, &id, &update).map_err(ApiError::from)
    })
    .await?;
    Ok(Json(json!({ "success": true, "topic": topic })))
}

/// DELETE /api/learning/topics/{id}
pub async fn delete_topic_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = caller_id(&caller)?;
    let deleted = with_conn(&state.pool, move |conn| {
        murmur_learning::delete_topic(conn, &user, &id).map_err(ApiError::from)
    })
    .await?;
    if !deleted {
        return Err(ApiError::NotFound("Learning topic not found".to_string()));
    }
    Ok(Json(json!({ "success": true, "message": "Learning topic deleted successfully" })))
}

/// GET /api/learning/topics/{id}/sessions
pub async fn list_topic_sessions_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<Json<Value>, ApiError> {
    let user = caller_id(&caller)?;
    let limit = page_limit(params.limit);
    let offset = params.offset.unwrap_or(0);
    let sessions = with_conn(&state.pool, move |conn| {
        murmur_learning::list_sessions(conn, &user, &id, limit, offset).map_err(ApiError::from)
    })
    .await?;
    Ok(Json(json!({ "sessions": sessions })))
}

/// GET /api/learning/stats
pub async fn learning_stats_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Value>, ApiError> {
    let user = caller_id(&caller)?;
    let stats = with_conn(&state.pool, move |conn| {
        murmur_learning::learning_stats(conn, &user).map_err(ApiError::from)
    })
    .await?;
    Ok(Json(json!({ "stats": stats })))
}
