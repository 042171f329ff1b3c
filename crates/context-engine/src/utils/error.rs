use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::services::context::PipelineError;

/// Client-facing message for every pipeline failure
pub const PROCESSING_FAILED_MESSAGE: &str = "Invalid request or processing failed";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Detail is logged, never sent to the client.
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::ProcessingFailed(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, "BadRequest", msg)
            }
            ApiError::ProcessingFailed(detail) => {
                tracing::error!("Processing failed: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "ProcessingFailed",
                    PROCESSING_FAILED_MESSAGE.to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}
