//! Store error types.

use cure_models::ModelError;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to the image store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to configure store client: {0}")]
    ConfigError(String),

    #[error("Image not found: {0}")]
    NotFound(String),

    #[error("Store request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid image payload: {0}")]
    InvalidPayload(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid spatial metadata: {0}")]
    Model(#[from] ModelError),
}

impl StoreError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::InvalidPayload(msg.into())
    }
}
