//! Error taxonomy shared by the dispatcher, the handlers and the HTTP facade.

use axum::http::StatusCode;
use thiserror::Error;

use crate::llm::LlmError;

/// Every failure a task can end in.
///
/// Each variant maps to exactly one HTTP status via [`TaskError::status_code`].
#[derive(Debug, Error)]
pub enum TaskError {
    /// Malformed or missing input to the dispatcher or a handler.
    #[error("{0}")]
    InvalidRequest(String),

    /// Missing input file, directory or database.
    #[error("{0}")]
    NotFound(String),

    /// Tool-call arguments were not valid JSON.
    #[error("Invalid JSON arguments: {0}")]
    MalformedArguments(String),

    /// The model selected a name that is not registered.
    #[error("Function not found: {0}")]
    UnknownOperation(String),

    /// Non-success response or transport failure from a remote service.
    #[error(transparent)]
    RemoteService(#[from] LlmError),

    /// A handler's internal processing failed.
    #[error("{0}")]
    OperationFailed(String),
}

impl TaskError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::MalformedArguments(_) | Self::UnknownOperation(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RemoteService(_) | Self::OperationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::NotFound(_) => "not_found",
            Self::MalformedArguments(_) => "malformed_arguments",
            Self::UnknownOperation(_) => "unknown_operation",
            Self::RemoteService(_) => "remote_service_error",
            Self::OperationFailed(_) => "operation_failed",
        }
    }
}

/// Build a `map_err` adapter that wraps any error as `OperationFailed` with context.
///
/// ```ignore
/// let text = fs::read_to_string(path).await.map_err(failed("Error processing dates"))?;
/// ```
pub fn failed<E: std::fmt::Display>(context: &'static str) -> impl Fn(E) -> TaskError {
    move |e| TaskError::OperationFailed(format!("{}: {}", context, e))
}
