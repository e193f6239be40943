use crate::identity::VerifiedUser;
use crate::AppState;
use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// Who is calling, as established by [`identity_middleware`].
#[derive(Clone, Debug, Default)]
pub struct Caller {
    /// `None` for anonymous callers.
    pub user: Option<VerifiedUser>,
    /// Whether an `Authorization: Bearer` header was sent at all.
    pub presented_token: bool,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

fn bearer_token(req: &Request<Body>) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Attaches a [`Caller`] to every request. A missing, rejected or
/// unverifiable token makes the caller anonymous; it never fails the request.
pub async fn identity_middleware(mut req: Request<Body>, next: Next) -> Response {
    let token = bearer_token(&req);
    let mut caller = Caller {
        user: None,
        presented_token: token.is_some(),
    };

    if let Some(token) = token {
        let state = req.extensions().get::<Arc<AppState>>().cloned();
        if let Some(state) = state {
            match state.identity.verify(&token).await {
                Ok(user) => caller.user = user,
                Err(e) => {
                    tracing::warn!(error = %e, "identity verification failed, treating caller as anonymous");
                }
            }
        }
    }

    req.extensions_mut().insert(caller);
    next.run(req).await
}

/// Rejects requests without a verified identity with `401`.
///
/// Must run inside [`identity_middleware`].
pub async fn require_identity(req: Request<Body>, next: Next) -> Response {
    let caller = req.extensions().get::<Caller>().cloned().unwrap_or_default();
    if caller.is_authenticated() {
        return next.run(req).await;
    }
    let message = if caller.presented_token {
        "Invalid token"
    } else {
        "No token provided"
    };
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
}
