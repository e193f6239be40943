//! Murmur server library logic.
//!
//! Wires the session store, tool resolver and domain stores behind an axum
//! router. Blocking SQLite work runs on `spawn_blocking` through
//! [`with_conn`]; remote collaborators (conversation provider, identity
//! service, Google APIs) sit behind traits held in [`AppState`] so tests can
//! script them.

pub mod api;
pub mod api_accounts;
pub mod api_learning;
pub mod api_sessions;
pub mod api_todos;
pub mod api_tools;
pub mod best_effort;
pub mod config;
pub mod credentials;
pub mod dispatch;
pub mod identity;
pub mod lifecycle;
pub mod middleware;
pub mod oauth_state;
pub mod tools;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Extension, Router,
};
use config::Config;
use identity::{IdentityVerifier, SupabaseVerifier};
use murmur_db::DbPool;
use murmur_google::{
    CalendarProvider, GmailClient, GoogleCalendarClient, GoogleOAuth, MailProvider, OAuthProvider,
};
use murmur_voice::{ConversationProvider, RealtimeClient};
use oauth_state::StateSigner;
use rusqlite::Connection;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::trace::TraceLayer;

/// Maximum request body size (1 MiB).
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Plain settings handlers read at request time.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Deployment label reported by `/api/check-config`.
    pub environment: String,
    /// Base URL the OAuth callback redirects to.
    pub frontend_url: String,
    /// Upper bound on one domain tool execution.
    pub tool_timeout: Duration,
}

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Mints ephemeral voice sessions.
    pub conversation: Arc<dyn ConversationProvider>,
    /// Verifies bearer tokens.
    pub identity: Arc<dyn IdentityVerifier>,
    pub oauth: Arc<dyn OAuthProvider>,
    pub mail: Arc<dyn MailProvider>,
    pub calendar: Arc<dyn CalendarProvider>,
    /// Signs the OAuth `state` parameter.
    pub oauth_state: StateSigner,
    pub settings: ServerSettings,
}

impl AppState {
    /// Builds the production collaborators from configuration.
    pub fn from_config(pool: DbPool, config: &Config) -> Self {
        let secret = if config.auth.state_secret.trim().is_empty() {
            tracing::warn!(
                "auth.state_secret is empty; using a random key, pending Google consents will not survive a restart"
            );
            format!("{}{}", uuid::Uuid::new_v4(), uuid::Uuid::new_v4())
        } else {
            config.auth.state_secret.clone()
        };

        Self {
            pool,
            conversation: Arc::new(RealtimeClient::new(config.realtime.clone())),
            identity: Arc::new(SupabaseVerifier::new(&config.identity)),
            oauth: Arc::new(GoogleOAuth::new(config.google.clone())),
            mail: Arc::new(GmailClient::new(&config.google)),
            calendar: Arc::new(GoogleCalendarClient::new(&config.google)),
            oauth_state: StateSigner::new(&secret, Duration::from_secs(config.auth.state_ttl_secs)),
            settings: ServerSettings {
                environment: config.server.environment.clone(),
                frontend_url: config.frontend.url.trim_end_matches('/').to_string(),
                tool_timeout: Duration::from_secs(config.tools.timeout_secs),
            },
        }
    }
}

/// Failures of the blocking-task plumbing itself, not of the work it runs.
#[derive(Debug, Error)]
pub enum InternalError {
    #[error("db connection failed: {0}")]
    Pool(String),
    #[error("task join error: {0}")]
    Join(String),
}

/// Runs `f` with a pooled connection on the blocking thread pool.
pub async fn with_conn<T, E, F>(pool: &DbPool, f: F) -> Result<T, E>
where
    F: FnOnce(&Connection) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: From<InternalError> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool
            .get()
            .map_err(|e| E::from(InternalError::Pool(e.to_string())))?;
        f(&conn)
    })
    .await
    .map_err(|e| E::from(InternalError::Join(e.to_string())))?
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/auth/profile", get(api::profile_handler))
        .route("/api/google/accounts", get(api_accounts::list_accounts_handler))
        .route("/api/google/auth", get(api_accounts::auth_url_handler))
        .route(
            "/api/google/accounts/{accountId}",
            axum::routing::delete(api_accounts::disconnect_handler),
        )
        .route(
            "/api/google/accounts/{accountId}/test",
            get(api_accounts::test_account_handler),
        )
        .route(
            "/api/todos",
            get(api_todos::list_todos_handler).post(api_todos::create_todo_handler),
        )
        .route("/api/todos/stats", get(api_todos::todo_stats_handler))
        .route(
            "/api/todos/categories",
            get(api_todos::list_categories_handler).post(api_todos::create_category_handler),
        )
        .route(
            "/api/todos/categories/{categoryId}",
            put(api_todos::update_category_handler).delete(api_todos::delete_category_handler),
        )
        .route(
            "/api/todos/{id}",
            get(api_todos::get_todo_handler)
                .patch(api_todos::update_todo_handler)
                .delete(api_todos::delete_todo_handler),
        )
        .route("/api/todos/{id}/complete", post(api_todos::complete_todo_handler))
        .route(
            "/api/learning/topics",
            get(api_learning::list_topics_handler).post(api_learning::create_topic_handler),
        )
        .route(
            "/api/learning/topics/{id}",
            get(api_learning::get_topic_handler)
                .patch(api_learning::update_topic_handler)
                .delete(api_learning::delete_topic_handler),
        )
        .route(
            "/api/learning/topics/{id}/sessions",
            get(api_learning::list_topic_sessions_handler),
        )
        .route("/api/learning/stats", get(api_learning::learning_stats_handler))
        .layer(axum::middleware::from_fn(middleware::require_identity));

    Router::new()
        .route("/health", get(api::health_handler))
        .route("/api/check-config", get(api::check_config_handler))
        .route(
            "/api/realtime/session",
            post(api_sessions::create_session_handler),
        )
        .route(
            "/api/realtime/sessions",
            get(api_sessions::list_sessions_handler),
        )
        .route(
            "/api/realtime/session/{id}",
            get(api_sessions::get_session_handler)
                .patch(api_sessions::update_session_handler)
                .delete(api_sessions::delete_session_handler),
        )
        .route(
            "/api/realtime/session/provider/{providerSessionId}",
            get(api_sessions::get_by_provider_handler),
        )
        .route(
            "/api/realtime/session/{id}/message",
            post(api_sessions::record_message_handler),
        )
        .route("/api/tools/{toolName}", post(api_tools::invoke_tool_handler))
        .route("/auth/google/callback", get(api_accounts::callback_handler))
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(axum::middleware::from_fn(middleware::identity_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
