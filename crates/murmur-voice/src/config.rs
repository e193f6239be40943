use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_REALTIME_BASE_URL: &str = "https://api.openai.com";

fn default_base_url() -> String {
    DEFAULT_REALTIME_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

/// Connection settings for the realtime conversation provider.
#[derive(Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// API key used to mint ephemeral sessions. Empty disables the provider.
    #[serde(skip_serializing, default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Upper bound on one session-minting request, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl fmt::Debug for RealtimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl RealtimeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}
