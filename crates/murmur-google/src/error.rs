use thiserror::Error;

#[derive(Error, Debug)]
pub enum GoogleError {
    #[error("google oauth client is not configured")]
    NotConfigured,

    #[error("google request failed: {0}")]
    Transport(String),

    #[error("google request timed out")]
    Timeout,

    #[error("google resource not found: {0}")]
    NotFound(String),

    #[error("google returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("unexpected google response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Validation(String),
}

impl From<reqwest::Error> for GoogleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Turns a non-success response into an error; 404 becomes `NotFound(what)`.
pub(crate) async fn check(
    response: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response, GoogleError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(GoogleError::NotFound(what.to_string()));
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), what, "google request rejected");
    Err(GoogleError::Upstream {
        status: status.as_u16(),
        body,
    })
}
