use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("conversation provider is not configured")]
    NotConfigured,

    #[error("conversation provider request failed: {0}")]
    Transport(String),

    #[error("conversation provider timed out")]
    Timeout,

    #[error("conversation provider returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("unexpected conversation provider response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for VoiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err.to_string())
        }
    }
}
