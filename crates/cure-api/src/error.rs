//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cure_models::ModelError;
use cure_store::StoreError;
use cure_vision::VisionError;
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Inference error: {0}")]
    Vision(#[from] VisionError),

    #[error("Invalid image: {0}")]
    Model(#[from] ModelError),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) | ApiError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_)
            | ApiError::Store(StoreError::InvalidPayload(_))
            | ApiError::Store(StoreError::Model(_)) => StatusCode::BAD_REQUEST,
            ApiError::Vision(VisionError::Model(e)) | ApiError::Model(e) => model_status(e),
            ApiError::Vision(e) if e.is_input_error() => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) | ApiError::Store(_) | ApiError::Vision(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short label for failure metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) | ApiError::Store(StoreError::NotFound(_)) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Internal(_) => "internal",
            ApiError::Store(_) => "store",
            ApiError::Vision(_) => "inference",
            ApiError::Model(_) => "invalid_image",
        }
    }

    fn is_internal(&self) -> bool {
        self.status_code().is_server_error()
    }
}

/// A category outside the label set is a model fault; anything else is bad metadata.
fn model_status(error: &ModelError) -> StatusCode {
    match error {
        ModelError::CategoryOutOfRange { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = if self.is_internal()
            && std::env::var("ENVIRONMENT").unwrap_or_default() == "production"
        {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            detail,
            code: Some(self.kind()),
        };

        (status, Json(body)).into_response()
    }
}
