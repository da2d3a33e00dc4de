//! API error type for the callback endpoint.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

use super::signature::VerificationError;

/// Errors returned by the callback endpoint as `{"error": "..."}`.
///
/// The `Display` text is what Facebook sees; details stay in the logs.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No signed_request")]
    MissingSignedRequest,

    #[error("Malformed signed_request")]
    MalformedInput(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Unsupported signing algorithm")]
    UnsupportedAlgorithm(String),

    #[error("Missing user_id in payload")]
    MissingUserId,

    #[error("Internal server error")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingSignedRequest
            | ApiError::MalformedInput(_)
            | ApiError::UnsupportedAlgorithm(_)
            | ApiError::MissingUserId => StatusCode::BAD_REQUEST,
            ApiError::InvalidSignature => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<VerificationError> for ApiError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::MalformedInput(detail) => ApiError::MalformedInput(detail),
            VerificationError::InvalidSignature => ApiError::InvalidSignature,
            VerificationError::UnsupportedAlgorithm(algorithm) => {
                ApiError::UnsupportedAlgorithm(algorithm)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            ApiError::Internal(detail) => {
                error!(status = status.as_u16(), detail = %detail, "deletion_callback_failed")
            }
            ApiError::MalformedInput(detail) | ApiError::UnsupportedAlgorithm(detail) => {
                warn!(status = status.as_u16(), detail = %detail, error = %self, "deletion_callback_rejected")
            }
            _ => warn!(status = status.as_u16(), error = %self, "deletion_callback_rejected"),
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
