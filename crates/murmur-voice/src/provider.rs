use crate::config::RealtimeConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use murmur_types::{ModelConfig, ToolDefinition};
use serde::Serialize;
use std::time::Duration;

/// A freshly minted conversation session.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSession {
    /// Provider-issued session id.
    pub id: String,
    /// Expiry of the ephemeral client secret, seconds since the epoch.
    pub client_secret_expires_at: Option<i64>,
    /// The provider's response, relayed to the browser unchanged.
    pub payload: serde_json::Value,
}

impl ProviderSession {
    /// Extracts the session id and secret expiry from a provider response.
    pub fn from_payload(payload: serde_json::Value) -> Result<Self, VoiceError> {
        let id = payload
            .get("id")
            .and_then(|v| v.as_str())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| VoiceError::InvalidResponse("missing session id".into()))?
            .to_string();
        let client_secret_expires_at = payload
            .pointer("/client_secret/expires_at")
            .and_then(|v| v.as_i64());
        Ok(Self {
            id,
            client_secret_expires_at,
            payload,
        })
    }
}

/// Mints ephemeral sessions on the speech model provider.
#[async_trait]
pub trait ConversationProvider: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Creates a session preloaded with `tools`.
    async fn create_ephemeral_session(
        &self,
        model: &ModelConfig,
        tools: &[ToolDefinition],
    ) -> Result<ProviderSession, VoiceError>;
}

#[derive(Serialize)]
struct SessionRequest<'a> {
    model: &'a str,
    voice: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
    tools: &'a [ToolDefinition],
    tool_choice: &'static str,
}

/// [`ConversationProvider`] backed by the OpenAI realtime sessions endpoint.
#[derive(Debug, Clone)]
pub struct RealtimeClient {
    config: RealtimeConfig,
    http: reqwest::Client,
}

impl RealtimeClient {
    pub fn new(config: RealtimeConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { config, http }
    }

    fn sessions_url(&self) -> String {
        format!("{}/v1/realtime/sessions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ConversationProvider for RealtimeClient {
    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn create_ephemeral_session(
        &self,
        model: &ModelConfig,
        tools: &[ToolDefinition],
    ) -> Result<ProviderSession, VoiceError> {
        if !self.is_configured() {
            return Err(VoiceError::NotConfigured);
        }

        let body = SessionRequest {
            model: &model.model,
            voice: &model.voice,
            instructions: model.instructions.as_deref(),
            tools,
            tool_choice: "auto",
        };
        let response = self
            .http
            .post(self.sessions_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "realtime session request rejected");
            return Err(VoiceError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VoiceError::InvalidResponse(e.to_string()))?;
        let session = ProviderSession::from_payload(payload)?;
        tracing::info!(
            provider_session_id = %session.id,
            model = %model.model,
            tools = tools.len(),
            "realtime session minted"
        );
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_parsing_requires_an_id() {
        let session = ProviderSession::from_payload(serde_json::json!({
            "id": "sess_123",
            "client_secret": {"value": "ek_abc", "expires_at": 1_700_000_000}
        }))
        .unwrap();
        assert_eq!(session.id, "sess_123");
        assert_eq!(session.client_secret_expires_at, Some(1_700_000_000));
        assert_eq!(session.payload["client_secret"]["value"], "ek_abc");

        assert!(matches!(
            ProviderSession::from_payload(serde_json::json!({"object": "realtime.session"})),
            Err(VoiceError::InvalidResponse(_))
        ));
    }

    #[test]
    fn request_body_carries_tools() {
        let tools = vec![ToolDefinition::function("set_mode", "Switch mode")];
        let model = ModelConfig::default();
        let body = serde_json::to_value(SessionRequest {
            model: &model.model,
            voice: &model.voice,
            instructions: None,
            tools: &tools,
            tool_choice: "auto",
        })
        .unwrap();
        assert_eq!(body["tools"][0]["name"], "set_mode");
        assert_eq!(body["voice"], "verse");
        assert!(body.get("instructions").is_none());
    }

    #[test]
    fn debug_output_hides_the_key() {
        let config = RealtimeConfig::new("sk-secret");
        assert!(!format!("{config:?}").contains("sk-secret"));
        assert!(config.is_configured());
        assert!(!RealtimeConfig::default().is_configured());
    }

    #[tokio::test]
    async fn unconfigured_client_refuses_early() {
        let client = RealtimeClient::new(RealtimeConfig::default());
        let err = client
            .create_ephemeral_session(&ModelConfig::default(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, VoiceError::NotConfigured));
    }
}
