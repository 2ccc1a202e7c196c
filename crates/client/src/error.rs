//! Orchestrator error types.

use cairn_cache::CacheError;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("{request_type} request timed out")]
    Timeout { request_type: String },

    #[error("{request_type} failed: {message}")]
    Remote {
        request_type: String,
        message: String,
    },

    #[error("worker channel closed")]
    ChannelClosed,

    #[error("failed to decode worker response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Core(#[from] cairn_core::Error),

    #[error("invalid content request: {0}")]
    InvalidRequest(String),
}

impl OrchestratorError {
    /// Request type named by timeout and remote errors.
    pub fn request_type(&self) -> Option<&str> {
        match self {
            Self::Timeout { request_type } | Self::Remote { request_type, .. } => {
                Some(request_type)
            }
            _ => None,
        }
    }
}

/// Result type for orchestrator operations.
pub type OrchestratorResult<T> = std::result::Result<T, OrchestratorError>;
