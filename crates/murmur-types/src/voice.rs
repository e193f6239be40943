//! Conversation model configuration.
//!
//! A `ModelConfig` tells the conversation provider which realtime model and
//! synthetic voice to use when minting a session.

use serde::{Deserialize, Serialize};

/// Default realtime model when the client does not ask for one.
pub const DEFAULT_MODEL: &str = "gpt-4o-realtime-preview";

/// Default synthetic voice.
pub const DEFAULT_VOICE: &str = "verse";

/// Model parameters for a new conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Realtime model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// Voice identifier.
    #[serde(default = "default_voice")]
    pub voice: String,
    /// Optional system instructions passed to the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_voice() -> String {
    DEFAULT_VOICE.to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            voice: default_voice(),
            instructions: None,
        }
    }
}
