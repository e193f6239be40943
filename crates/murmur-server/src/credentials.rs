//! Access-token refresh for connected accounts.

use crate::api::ApiError;
use crate::{with_conn, AppState};
use murmur_accounts::{Account, AccountError, TokenUpdate};
use murmur_google::GoogleError;

const REFRESH_FAILED: &str = "Failed to refresh access token";

fn refresh_error(err: GoogleError) -> ApiError {
    match err {
        GoogleError::Timeout | GoogleError::NotConfigured => err.into(),
        other => ApiError::Upstream {
            message: REFRESH_FAILED.to_string(),
            details: other.to_string(),
        },
    }
}

/// Exchanges the account's refresh token for a new access token and stores
/// it. A refresh token the provider did not rotate is kept.
pub async fn refresh_account(state: &AppState, account: Account) -> Result<Account, ApiError> {
    let refresh_token = account
        .refresh_token
        .clone()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Upstream {
            message: REFRESH_FAILED.to_string(),
            details: format!("no refresh token stored for {}", account.email),
        })?;

    let grant = state.oauth.refresh(&refresh_token).await.map_err(refresh_error)?;
    let update = TokenUpdate {
        access_token: grant.access_token,
        refresh_token: grant.refresh_token,
        expires_at: grant.expires_at,
    };
    let account_id = account.id.clone();
    let refreshed = with_conn(&state.pool, move |conn| {
        murmur_accounts::update_tokens(conn, &account_id, &update).map_err(ApiError::from)
    })
    .await?;
    tracing::info!(account_id = %refreshed.id, "access token refreshed");
    Ok(refreshed)
}

/// Loads one of `user_id`'s accounts by id, refreshing its token if expired.
pub async fn usable_account(
    state: &AppState,
    user_id: &str,
    account_id: &str,
) -> Result<Account, ApiError> {
    let (user, id) = (user_id.to_string(), account_id.to_string());
    let account = with_conn(&state.pool, move |conn| {
        murmur_accounts::get_account(conn, &user, &id).map_err(ApiError::from)
    })
    .await?;

    if account.is_expired_at(chrono::Utc::now()) {
        return refresh_account(state, account).await;
    }
    Ok(account)
}

/// Splits a credentials lookup into a usable account or the expired one.
pub(crate) fn expired_or(result: Result<Account, AccountError>) -> Result<(Account, bool), AccountError> {
    match result {
        Ok(account) => Ok((account, false)),
        Err(AccountError::Expired(account)) => Ok((*account, true)),
        Err(e) => Err(e),
    }
}
