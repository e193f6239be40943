use crate::config::{GoogleConfig, SCOPES};
use crate::error::{check, GoogleError};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// Tokens returned by a code exchange or a refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenGrant {
    pub access_token: String,
    /// Only present on the first consent, or when the provider rotates it.
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
}

/// Profile of the Google user that granted access.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Consent page URL carrying `state` back to the callback.
    fn authorization_url(&self, state: &str) -> Result<String, GoogleError>;

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, GoogleError>;

    async fn user_info(&self, access_token: &str) -> Result<UserInfo, GoogleError>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, GoogleError>;

    async fn revoke(&self, token: &str) -> Result<(), GoogleError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    fn into_grant(self, now: DateTime<Utc>) -> TokenGrant {
        TokenGrant {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_in.map(|secs| now + Duration::seconds(secs)),
            scopes: self
                .scope
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
        }
    }
}

/// [`OAuthProvider`] for Google's OAuth 2.0 endpoints.
#[derive(Debug, Clone)]
pub struct GoogleOAuth {
    config: GoogleConfig,
    http: reqwest::Client,
}

impl GoogleOAuth {
    pub fn new(config: GoogleConfig) -> Self {
        let http = config.http_client();
        Self { config, http }
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenGrant, GoogleError> {
        if !self.is_configured() {
            return Err(GoogleError::NotConfigured);
        }
        let response = self
            .http
            .post(&self.config.token_url)
            .form(form)
            .send()
            .await?;
        let token: TokenResponse = check(response, "token").await?.json().await?;
        Ok(token.into_grant(Utc::now()))
    }
}

#[async_trait]
impl OAuthProvider for GoogleOAuth {
    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    fn authorization_url(&self, state: &str) -> Result<String, GoogleError> {
        if !self.is_configured() {
            return Err(GoogleError::NotConfigured);
        }
        let url = url::Url::parse_with_params(
            &self.config.auth_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("scope", &SCOPES.join(" ")),
                ("state", state),
            ],
        )
        .map_err(|e| GoogleError::Validation(format!("invalid auth url: {e}")))?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, GoogleError> {
        let grant = self
            .token_request(&[
                ("code", code),
                ("client_id", &self.config.client_id),
                ("client_secret", &self.config.client_secret),
                ("redirect_uri", &self.config.redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .await?;
        tracing::debug!(scopes = grant.scopes.len(), "authorization code exchanged");
        Ok(grant)
    }

    async fn user_info(&self, access_token: &str) -> Result<UserInfo, GoogleError> {
        let response = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;
        Ok(check(response, "userinfo").await?.json().await?)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, GoogleError> {
        self.token_request(&[
            ("refresh_token", refresh_token),
            ("client_id", &self.config.client_id),
            ("client_secret", &self.config.client_secret),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    async fn revoke(&self, token: &str) -> Result<(), GoogleError> {
        let response = self
            .http
            .post(&self.config.revoke_url)
            .form(&[("token", token)])
            .send()
            .await?;
        check(response, "token").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> GoogleOAuth {
        GoogleOAuth::new(GoogleConfig {
            client_id: "client-1".into(),
            client_secret: "shh".into(),
            redirect_uri: "http://localhost:3001/auth/google/callback".into(),
            ..GoogleConfig::default()
        })
    }

    #[test]
    fn authorization_url_requests_offline_consent() {
        let url = url::Url::parse(&configured().authorization_url("abc.def").unwrap()).unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "client-1");
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["prompt"], "consent");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["state"], "abc.def");
        assert!(params["scope"].contains("gmail.send"));
        assert!(params["scope"].contains("calendar.events"));
    }

    #[test]
    fn unconfigured_client_has_no_consent_url() {
        let oauth = GoogleOAuth::new(GoogleConfig::default());
        assert!(matches!(
            oauth.authorization_url("x"),
            Err(GoogleError::NotConfigured)
        ));
    }

    #[test]
    fn token_response_computes_expiry() {
        let now = Utc::now();
        let grant = TokenResponse {
            access_token: "at".into(),
            refresh_token: None,
            expires_in: Some(3600),
            scope: Some("a b".into()),
        }
        .into_grant(now);
        assert_eq!(grant.expires_at, Some(now + Duration::seconds(3600)));
        assert_eq!(grant.scopes, vec!["a", "b"]);
        assert!(grant.refresh_token.is_none());
    }

    #[test]
    fn debug_hides_secret() {
        let oauth = configured();
        assert!(!format!("{oauth:?}").contains("shh"));
    }
}
