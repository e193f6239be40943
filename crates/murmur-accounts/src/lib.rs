//! Connected external accounts.
//!
//! A user may authorize several mail/calendar accounts. The directory stores
//! their OAuth tokens and answers the questions the tool layer asks: which
//! accounts does this user have, and can we act on this one right now.
//! Tokens never leave this crate except through [`credentials_for`], and the
//! [`AccountSummary`] projection used by the HTTP surface omits them.

use chrono::{DateTime, Utc};
use murmur_db::{format_timestamp, parse_timestamp};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// The user has no such account.
    #[error("account not found: {0}")]
    NotFound(String),
    /// The account exists but its access token has expired.
    #[error("access token expired for {}", .0.email)]
    Expired(Box<Account>),
}

/// A connected account with its credentials.
#[derive(Clone, PartialEq)]
pub struct Account {
    pub id: String,
    pub user_id: String,
    /// The provider's stable id for the account holder.
    pub provider_user_id: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub scopes: Vec<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_expires_at", &self.token_expires_at)
            .finish_non_exhaustive()
    }
}

impl Account {
    /// Whether the access token is unusable at `now`. Accounts without a
    /// recorded expiry are treated as valid.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.token_expires_at
            .as_deref()
            .and_then(parse_timestamp)
            .is_some_and(|expires| expires <= now)
    }

    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            picture: self.picture.clone(),
            connected_at: self.created_at.clone(),
        }
    }
}

/// Token-free view of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub connected_at: String,
}

/// Result of a completed authorization, ready to store.
#[derive(Clone)]
pub struct NewAccount {
    pub user_id: String,
    pub provider_user_id: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub scopes: Vec<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
}

/// Fresh tokens from a refresh grant.
#[derive(Clone)]
pub struct TokenUpdate {
    pub access_token: String,
    /// Providers only sometimes rotate the refresh token; `None` keeps the
    /// stored one.
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

const ACCOUNT_COLUMNS: &str = "id, user_id, provider_user_id, email, name, picture, scopes_json,
    access_token, refresh_token, token_expires_at, created_at, updated_at";

fn map_row_to_account(row: &Row<'_>) -> rusqlite::Result<(Account, String)> {
    Ok((
        Account {
            id: row.get(0)?,
            user_id: row.get(1)?,
            provider_user_id: row.get(2)?,
            email: row.get(3)?,
            name: row.get(4)?,
            picture: row.get(5)?,
            scopes: Vec::new(),
            access_token: row.get(7)?,
            refresh_token: row.get(8)?,
            token_expires_at: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        },
        row.get(6)?,
    ))
}

fn decode((mut account, scopes_json): (Account, String)) -> Result<Account, AccountError> {
    account.scopes = serde_json::from_str(&scopes_json)?;
    Ok(account)
}

fn query_accounts(
    conn: &Connection,
    filter: &str,
    args: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Account>, AccountError> {
    let sql = format!(
        "SELECT {ACCOUNT_COLUMNS} FROM connected_accounts WHERE {filter}
        ORDER BY created_at DESC, rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(args, map_row_to_account)?;
    let mut accounts = Vec::new();
    for row in rows {
        accounts.push(decode(row?)?);
    }
    Ok(accounts)
}

/// Lists a user's accounts, most recently connected first.
///
/// Anonymous callers (`None`) have no accounts.
pub fn accounts_for_user(
    conn: &Connection,
    user_id: Option<&str>,
) -> Result<Vec<Account>, AccountError> {
    match user_id {
        Some(user_id) => query_accounts(conn, "user_id = ?1", &[&user_id]),
        None => Ok(Vec::new()),
    }
}

/// Emails of a user's accounts, in [`accounts_for_user`] order.
pub fn account_emails(
    conn: &Connection,
    user_id: Option<&str>,
) -> Result<Vec<String>, AccountError> {
    Ok(accounts_for_user(conn, user_id)?
        .into_iter()
        .map(|a| a.email)
        .collect())
}

/// Number of accounts a user has connected.
pub fn count_accounts(conn: &Connection, user_id: Option<&str>) -> Result<i64, AccountError> {
    let Some(user_id) = user_id else {
        return Ok(0);
    };
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM connected_accounts WHERE user_id = ?1",
        [user_id],
        |row| row.get(0),
    )?)
}

pub fn has_accounts(conn: &Connection, user_id: Option<&str>) -> Result<bool, AccountError> {
    Ok(count_accounts(conn, user_id)? > 0)
}

/// Looks up one of `user_id`'s accounts by email (case-insensitive).
///
/// Accounts belonging to other users are invisible: they produce
/// [`AccountError::NotFound`] like a missing account would.
pub fn find_by_email(
    conn: &Connection,
    user_id: &str,
    email: &str,
) -> Result<Account, AccountError> {
    query_accounts(conn, "user_id = ?1 AND email = ?2 COLLATE NOCASE", &[&user_id, &email])?
        .into_iter()
        .next()
        .ok_or_else(|| AccountError::NotFound(email.to_string()))
}

/// Returns usable credentials for `user_id`'s account `email`.
///
/// Distinguishes an account that is gone ([`AccountError::NotFound`]) from one
/// whose access token needs refreshing ([`AccountError::Expired`], carrying
/// the account so the caller can refresh it).
pub fn credentials_for(
    conn: &Connection,
    user_id: Option<&str>,
    email: &str,
) -> Result<Account, AccountError> {
    let Some(user_id) = user_id else {
        return Err(AccountError::NotFound(email.to_string()));
    };
    let account = find_by_email(conn, user_id, email)?;
    if account.is_expired_at(Utc::now()) {
        return Err(AccountError::Expired(Box::new(account)));
    }
    Ok(account)
}

/// Fetches one of the user's accounts by id.
pub fn get_account(
    conn: &Connection,
    user_id: &str,
    account_id: &str,
) -> Result<Account, AccountError> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM connected_accounts WHERE id = ?1 AND user_id = ?2");
    conn.query_row(&sql, params![account_id, user_id], map_row_to_account)
        .optional()?
        .map(decode)
        .transpose()?
        .ok_or_else(|| AccountError::NotFound(account_id.to_string()))
}

/// Stores a completed authorization.
///
/// Re-authorizing the same provider account replaces its profile and tokens
/// but keeps its id, its connection date, and (when the provider sent none)
/// its refresh token.
pub fn upsert_account(conn: &Connection, new: &NewAccount) -> Result<Account, AccountError> {
    let now = format_timestamp(Utc::now());
    conn.execute(
        "INSERT INTO connected_accounts (
            id, user_id, provider_user_id, email, name, picture, scopes_json,
            access_token, refresh_token, token_expires_at, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
        ON CONFLICT (user_id, provider_user_id) DO UPDATE SET
            email = excluded.email,
            name = excluded.name,
            picture = excluded.picture,
            scopes_json = excluded.scopes_json,
            access_token = excluded.access_token,
            refresh_token = COALESCE(excluded.refresh_token, connected_accounts.refresh_token),
            token_expires_at = excluded.token_expires_at,
            updated_at = excluded.updated_at",
        params![
            uuid::Uuid::new_v4().to_string(),
            new.user_id,
            new.provider_user_id,
            new.email,
            new.name,
            new.picture,
            serde_json::to_string(&new.scopes)?,
            new.access_token,
            new.refresh_token,
            new.token_expires_at.map(format_timestamp),
            now,
        ],
    )?;

    let account = query_accounts(
        conn,
        "user_id = ?1 AND provider_user_id = ?2",
        &[&new.user_id, &new.provider_user_id],
    )?
    .into_iter()
    .next()
    .ok_or_else(|| AccountError::NotFound(new.email.clone()))?;

    tracing::info!(user_id = %new.user_id, account_id = %account.id, "account connected");
    Ok(account)
}

/// Stores refreshed tokens and returns the updated account.
pub fn update_tokens(
    conn: &Connection,
    account_id: &str,
    tokens: &TokenUpdate,
) -> Result<Account, AccountError> {
    let updated = conn.execute(
        "UPDATE connected_accounts SET
            access_token = ?1,
            refresh_token = COALESCE(?2, refresh_token),
            token_expires_at = ?3,
            updated_at = ?4
        WHERE id = ?5",
        params![
            tokens.access_token,
            tokens.refresh_token,
            tokens.expires_at.map(format_timestamp),
            format_timestamp(Utc::now()),
            account_id,
        ],
    )?;
    if updated == 0 {
        return Err(AccountError::NotFound(account_id.to_string()));
    }

    tracing::debug!(account_id, "account tokens refreshed");
    query_accounts(conn, "id = ?1", &[&account_id])?
        .into_iter()
        .next()
        .ok_or_else(|| AccountError::NotFound(account_id.to_string()))
}

/// Removes one of the user's accounts. Returns `false` if it did not exist.
pub fn delete_account(
    conn: &Connection,
    user_id: &str,
    account_id: &str,
) -> Result<bool, AccountError> {
    let deleted = conn.execute(
        "DELETE FROM connected_accounts WHERE id = ?1 AND user_id = ?2",
        params![account_id, user_id],
    )?;
    if deleted > 0 {
        tracing::info!(user_id, account_id, "account disconnected");
    }
    Ok(deleted > 0)
}
