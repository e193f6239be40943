//! Google account connection: consent URL, OAuth callback, listing,
//! disconnect and an access probe.

use crate::api::{caller_id, ApiError};
use crate::best_effort::BestEffort;
use crate::credentials;
use crate::middleware::Caller;
use crate::{with_conn, AppState};
use axum::{
    extract::{Extension, Path, Query},
    response::{IntoResponse, Json, Redirect, Response},
};
use murmur_accounts::{Account, NewAccount};
use murmur_google::GoogleError;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by Google when the user declined consent.
    pub error: Option<String>,
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// GET /api/google/accounts
pub async fn list_accounts_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Value>, ApiError> {
    let user = caller_id(&caller)?;
    let accounts = with_conn(&state.pool, move |conn| {
        murmur_accounts::accounts_for_user(conn, Some(&user)).map_err(ApiError::from)
    })
    .await?;
    let summaries: Vec<_> = accounts.iter().map(Account::summary).collect();
    Ok(Json(json!({ "accounts": summaries })))
}

/// GET /api/google/auth
pub async fn auth_url_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Value>, ApiError> {
    let user = caller_id(&caller)?;
    let signed = state.oauth_state.sign(&user);
    let auth_url = state.oauth.authorization_url(&signed)?;
    Ok(Json(json!({ "authUrl": auth_url })))
}

/// Exchanges the code and stores the account. Returns the connected email.
async fn complete_authorization(
    state: &AppState,
    user_id: String,
    code: &str,
) -> Result<String, ApiError> {
    let grant = state.oauth.exchange_code(code).await?;
    let profile = state.oauth.user_info(&grant.access_token).await?;

    let new = NewAccount {
        user_id,
        provider_user_id: profile.id,
        email: profile.email,
        name: profile.name,
        picture: profile.picture,
        scopes: grant.scopes,
        access_token: grant.access_token,
        refresh_token: grant.refresh_token,
        token_expires_at: grant.expires_at,
    };
    let account = with_conn(&state.pool, move |conn| {
        murmur_accounts::upsert_account(conn, &new).map_err(ApiError::from)
    })
    .await?;
    tracing::info!(account_id = %account.id, "google account connected");
    Ok(account.email)
}

/// GET /auth/google/callback
///
/// Authenticated by the signed `state` rather than a bearer token, since
/// the browser arrives here from Google's consent page.
pub async fn callback_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let settings_url = format!("{}/settings", state.settings.frontend_url);

    if let Some(error) = params.error.as_deref() {
        tracing::info!(error = %error, "google consent declined");
        return Redirect::to(&format!("{settings_url}?error=auth_failed")).into_response();
    }
    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return ApiError::BadRequest("Authorization code not provided".to_string()).into_response();
    };
    let Some(signed) = params.state.filter(|s| !s.is_empty()) else {
        return ApiError::BadRequest("State parameter missing".to_string()).into_response();
    };

    let user_id = match state.oauth_state.verify(&signed) {
        Ok(user_id) => user_id,
        Err(e) => {
            tracing::warn!(error = %e, "rejected oauth state");
            return ApiError::BadRequest("Invalid state parameter".to_string()).into_response();
        }
    };

    match complete_authorization(&state, user_id, &code).await {
        Ok(email) => Redirect::to(&format!(
            "{settings_url}?connected=true&email={}",
            encode(&email)
        ))
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "google oauth callback failed");
            Redirect::to(&format!("{settings_url}?error=auth_failed")).into_response()
        }
    }
}

/// DELETE /api/google/accounts/{accountId}
///
/// Revocation at Google is best-effort; the stored account is always removed.
pub async fn disconnect_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(account_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = caller_id(&caller)?;
    let (lookup_user, lookup_id) = (user.clone(), account_id.clone());
    let account = with_conn(&state.pool, move |conn| {
        murmur_accounts::get_account(conn, &lookup_user, &lookup_id).map_err(ApiError::from)
    })
    .await?;

    let token = account
        .refresh_token
        .clone()
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| account.access_token.clone());
    BestEffort::from_result("revoke google token", state.oauth.revoke(&token).await).ok();

    let deleted = with_conn(&state.pool, move |conn| {
        murmur_accounts::delete_account(conn, &user, &account_id).map_err(ApiError::from)
    })
    .await?;
    if !deleted {
        return Err(ApiError::NotFound("Account not found".to_string()));
    }
    tracing::info!(account_id = %account.id, "google account disconnected");
    Ok(Json(json!({
        "success": true,
        "message": "Account disconnected successfully",
    })))
}

fn probe_error(err: GoogleError) -> ApiError {
    match err {
        GoogleError::Timeout | GoogleError::NotConfigured => err.into(),
        other => ApiError::Upstream {
            message: "Failed to access Google APIs".to_string(),
            details: other.to_string(),
        },
    }
}

/// GET /api/google/accounts/{accountId}/test
pub async fn test_account_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(account_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = caller_id(&caller)?;
    let account = credentials::usable_account(&state, &user, &account_id).await?;

    let profile = state
        .mail
        .profile(&account.access_token)
        .await
        .map_err(probe_error)?;
    let calendars = state
        .calendar
        .list_calendars(&account.access_token)
        .await
        .map_err(probe_error)?;

    Ok(Json(json!({
        "success": true,
        "email": account.email,
        "gmail": {
            "emailAddress": profile.email_address,
            "messagesTotal": profile.messages_total,
            "threadsTotal": profile.threads_total,
        },
        "calendar": {
            "calendarsCount": calendars.len(),
            "calendars": calendars,
        },
    })))
}
