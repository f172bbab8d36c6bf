//! Error types for preprocessing and inference.

use std::path::PathBuf;

use cure_models::ModelError;
use thiserror::Error;

/// Result type for vision operations.
pub type VisionResult<T> = Result<T, VisionError>;

/// Errors that can occur while preprocessing or running the model.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Invalid image shape: {0}")]
    InvalidShape(String),

    #[error("Model weights not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("Unsupported weights format: {0}")]
    UnsupportedWeights(String),

    #[error("Unsupported target layer: {0}")]
    UnsupportedLayer(String),

    #[error("Invalid model config: {0}")]
    InvalidConfig(String),

    #[error("Tensor error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Invalid model value: {0}")]
    Model(#[from] ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VisionError {
    pub fn invalid_shape(msg: impl Into<String>) -> Self {
        Self::InvalidShape(msg.into())
    }

    pub fn unsupported_layer(msg: impl Into<String>) -> Self {
        Self::UnsupportedLayer(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the failure comes from the caller's input rather than the model.
    pub fn is_input_error(&self) -> bool {
        matches!(self, VisionError::InvalidShape(_))
    }
}
