//! Learning-topic tracking.
//!
//! A topic accumulates study sessions. Resuming a topic
//! ([`continue_topic`]) opens a numbered session and hands back the last
//! summary and next steps; saving progress ([`save_progress`]) closes it,
//! merges the concepts covered into the topic, and adds the session's
//! duration to the topic's total.

mod model;
mod progress;
mod stats;
mod topics;

pub use model::{
    Continuation, Difficulty, LearningSession, LearningTopic, NewTopic, ProgressUpdate,
    SavedProgress, TopicFilter, TopicStatus, TopicUpdate,
};
pub use progress::{continue_topic, list_sessions, merge_concepts, save_progress};
pub use stats::{learning_stats, LearningStats};
pub use topics::{
    create_topic, delete_topic, find_topic_by_title, get_topic, list_topics, update_topic,
};

/// Errors that can occur during learning operations.
#[derive(Debug, thiserror::Error)]
pub enum LearningError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("learning topic not found: {0}")]
    NotFound(String),
    #[error("invalid learning request: {0}")]
    Validation(String),
}
