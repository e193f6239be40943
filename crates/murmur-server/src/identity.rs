//! Bearer-token verification against the identity service.

use crate::config::IdentityConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// A user whose token the identity service accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity service request failed: {0}")]
    Transport(String),
    #[error("identity service returned {0}")]
    Upstream(u16),
    #[error("unexpected identity service response: {0}")]
    InvalidResponse(String),
}

/// Resolves a bearer token to a user. `Ok(None)` means the token was
/// rejected; errors mean the service could not be asked.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn verify(&self, token: &str) -> Result<Option<VerifiedUser>, IdentityError>;
}

/// [`IdentityVerifier`] for a Supabase-compatible `/auth/v1/user` endpoint.
#[derive(Debug, Clone)]
pub struct SupabaseVerifier {
    base_url: String,
    anon_key: String,
    http: reqwest::Client,
}

impl SupabaseVerifier {
    pub fn new(config: &IdentityConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
            http,
        }
    }
}

#[async_trait]
impl IdentityVerifier for SupabaseVerifier {
    fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.anon_key.is_empty()
    }

    async fn verify(&self, token: &str) -> Result<Option<VerifiedUser>, IdentityError> {
        if !self.is_configured() {
            return Ok(None);
        }
        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(IdentityError::Upstream(status.as_u16()));
        }
        let user: VerifiedUser = response
            .json()
            .await
            .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;
        Ok(Some(user))
    }
}
