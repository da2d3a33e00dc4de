//! HTTP endpoint handlers.
//!
//! The callback handler only verifies and enqueues; it returns before any
//! store call is made. Deletion happens on the background worker.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequest, Query, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::Html,
    Form, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use url::Url;

use super::error::ApiError;
use super::signature::verify_signed_request;
use super::status_page;
use crate::deletion::{generate_confirmation_code, status_url, DeletionDispatcher};
use crate::queue::{DeletionJob, DeletionQueue};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub app_secret: Arc<str>,
    pub base_url: Arc<Url>,
    pub dispatcher: DeletionDispatcher,
    pub queue: DeletionQueue,
}

impl AppState {
    pub fn new(
        app_secret: &str,
        base_url: Url,
        dispatcher: DeletionDispatcher,
        queue: DeletionQueue,
    ) -> Self {
        Self {
            app_secret: Arc::from(app_secret),
            base_url: Arc::new(base_url),
            dispatcher,
            queue,
        }
    }
}

// =============================================================================
// Liveness
// =============================================================================

/// Plain-text liveness message.
pub async fn root() -> &'static str {
    "Facebook Data Deletion Server is running!"
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Data Deletion Callback
// =============================================================================

/// Callback body fields.
///
/// Facebook posts form-encoded data; JSON is accepted for manual testing.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackForm {
    #[serde(default)]
    pub signed_request: Option<String>,
}

/// Extracts [`CallbackForm`] from either a form or a JSON body.
pub struct CallbackBody(pub CallbackForm);

#[async_trait]
impl<S> FromRequest<S> for CallbackBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.trim_start().starts_with("application/json"))
            .unwrap_or(false);

        if is_json {
            let Json(form) = Json::<CallbackForm>::from_request(req, state)
                .await
                .map_err(|e| ApiError::MalformedInput(e.body_text()))?;
            Ok(CallbackBody(form))
        } else {
            let Form(form) = Form::<CallbackForm>::from_request(req, state)
                .await
                .map_err(|e| ApiError::MalformedInput(e.body_text()))?;
            Ok(CallbackBody(form))
        }
    }
}

/// Callback success response, in the shape Facebook expects.
#[derive(Debug, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub url: String,
    pub confirmation_code: String,
}

/// Facebook data deletion callback endpoint.
///
/// This endpoint:
/// 1. Verifies the signed request
/// 2. Issues a confirmation code and status URL
/// 3. Enqueues the deletion and returns without waiting for it
pub async fn deletion_callback(
    State(state): State<AppState>,
    CallbackBody(form): CallbackBody,
) -> Result<Json<CallbackResponse>, ApiError> {
    let signed_request = form
        .signed_request
        .filter(|s| !s.is_empty())
        .ok_or(ApiError::MissingSignedRequest)?;

    info!(
        signed_request_length = signed_request.len(),
        "deletion_callback_received"
    );

    let payload = verify_signed_request(&signed_request, state.app_secret.as_bytes())?;
    let user_id = payload.user_id().ok_or(ApiError::MissingUserId)?.to_string();

    let confirmation_code = generate_confirmation_code();
    let url = status_url(&state.base_url, &confirmation_code);

    state
        .queue
        .publish(DeletionJob::new(confirmation_code.clone(), user_id.clone()))
        .map_err(|e| {
            error!(
                confirmation_code = %confirmation_code,
                user_id = %user_id,
                "deletion_job_enqueue_failed"
            );
            ApiError::Internal(e.to_string())
        })?;

    info!(
        confirmation_code = %confirmation_code,
        user_id = %user_id,
        "deletion_callback_accepted"
    );

    Ok(Json(CallbackResponse {
        url,
        confirmation_code,
    }))
}

// =============================================================================
// Deletion Status Page
// =============================================================================

/// Status page query string.
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub code: Option<String>,
}

/// Human-readable deletion status page.
pub async fn deletion_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> (StatusCode, Html<String>) {
    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        return (StatusCode::BAD_REQUEST, Html(status_page::missing_code()));
    };

    match state.dispatcher.lookup(&code).await {
        Ok(Some(record)) => {
            info!(
                confirmation_code = %code,
                status = record.status.as_str(),
                "deletion_status_resolved"
            );
            (StatusCode::OK, Html(status_page::resolved(&code, &record)))
        }
        Ok(None) => {
            info!(confirmation_code = %code, "deletion_status_pending");
            (StatusCode::OK, Html(status_page::processing(&code)))
        }
        Err(e) => {
            error!(confirmation_code = %code, error = %e, "deletion_status_lookup_failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(status_page::server_error()),
            )
        }
    }
}
