//! Web server module for the data deletion callback.
//!
//! Routes:
//! - `GET /` and `GET /health`: liveness
//! - `POST /fb-deletion-callback`: Facebook's signed deletion request
//! - `GET /deletion-status?code=...`: status page linked from Facebook

pub mod error;
pub mod handlers;
pub mod signature;
pub mod status_page;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::deletion::STATUS_PATH;

pub use error::{ApiError, ErrorResponse};
pub use handlers::{
    deletion_callback, deletion_status, health, root, AppState, CallbackForm, CallbackResponse,
    HealthResponse,
};
pub use signature::{sign_payload, verify_signed_request, SignedRequestPayload, VerificationError};

/// Path Facebook posts deletion requests to.
pub const CALLBACK_PATH: &str = "/fb-deletion-callback";

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route(CALLBACK_PATH, post(deletion_callback))
        .route(STATUS_PATH, get(deletion_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests;
