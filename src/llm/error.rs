use thiserror::Error;

/// Errors from remote model calls.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("AIPROXY_TOKEN environment variable is missing")]
    MissingToken,

    #[error("Remote service request failed: {0}")]
    Transport(String),

    #[error("Remote service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response from remote service: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Pass successful responses through; turn anything else into [`LlmError::Status`].
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(LlmError::Status {
        status: status.as_u16(),
        body,
    })
}
