//! Worker error types.

use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use std::time::Duration;

/// Errors from the network client and its construction.
///
/// Cloneable so that every caller coalesced onto one construction attempt
/// receives the same outcome.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    #[error("network client construction failed: {0}")]
    Construction(String),

    #[error("network client construction timed out after {}s", .0.as_secs())]
    ConstructionTimeout(Duration),

    #[error("listing failed: {0}")]
    Listing(String),

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("invalid CID in listing: {0}")]
    InvalidCid(String),
}

impl ClientError {
    /// Whether the error came from building the client rather than using it.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Construction(_) | Self::ConstructionTimeout(_))
    }
}

/// Result type for network client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by worker operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Core(#[from] cairn_core::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl WorkerError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Client(e) if e.is_unavailable() => "client_unavailable",
            Self::Client(_) => "client_error",
            Self::Core(_) => "core_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Core(cairn_core::Error::InvalidCid(_))
            | Self::Core(cairn_core::Error::MalformedRequest(_)) => StatusCode::BAD_REQUEST,
            Self::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WorkerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        }
        (
            status,
            [(CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

/// Result type for worker operations.
pub type WorkerResult<T> = std::result::Result<T, WorkerError>;
