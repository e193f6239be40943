//! Conversation provider client.
//!
//! The browser talks to the speech model directly over a peer-to-peer
//! channel; the server only mints the ephemeral session that channel uses,
//! preloaded with the tools the model may call. [`ConversationProvider`] is
//! the seam the server depends on, [`RealtimeClient`] the production
//! implementation.

pub mod config;
pub mod error;
pub mod provider;

pub use config::RealtimeConfig;
pub use error::VoiceError;
pub use provider::{ConversationProvider, ProviderSession, RealtimeClient};
