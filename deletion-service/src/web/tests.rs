//! Router tests for the web module.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedReceiver;
use tower::ServiceExt;
use url::Url;

use super::*;
use crate::deletion::dispatcher::tests::{FailingStore, UsersDownStore};
use crate::deletion::{DeletionDispatcher, DeletionOutcome, DeletionRecord};
use crate::queue::{DeletionJob, DeletionQueue};
use crate::store::{MemoryStore, SharedStore};

const SECRET: &str = "s3cr3t";

struct TestApp {
    router: Router,
    jobs: UnboundedReceiver<DeletionJob>,
    dispatcher: DeletionDispatcher,
}

fn test_app_with_store(store: SharedStore) -> TestApp {
    let dispatcher = DeletionDispatcher::new(store, "users", "deletion_logs");
    let (queue, jobs) = DeletionQueue::new();
    let state = AppState::new(
        SECRET,
        Url::parse("https://deletion.example.com").unwrap(),
        dispatcher.clone(),
        queue,
    );
    TestApp {
        router: router(state),
        jobs,
        dispatcher,
    }
}

fn test_app() -> TestApp {
    test_app_with_store(Arc::new(MemoryStore::new()))
}

fn form_request(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(CALLBACK_PATH)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

// ============================================================================
// Liveness
// ============================================================================

#[tokio::test]
async fn test_root_is_live() {
    let app = test_app();
    let response = app.router.oneshot(get_request("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!body_string(response).await.is_empty());
}

#[tokio::test]
async fn test_health() {
    let app = test_app();
    let response = app.router.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "status": "ok" }));
}

// ============================================================================
// Deletion Callback
// ============================================================================

#[tokio::test]
async fn test_callback_accepts_signed_form() {
    let mut app = test_app();
    let signed = sign_payload(br#"{"algorithm":"HMAC-SHA256","user_id":"u1"}"#, SECRET.as_bytes());

    let response = app
        .router
        .oneshot(form_request(format!("signed_request={}", signed)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: CallbackResponse = serde_json::from_value(body_json(response).await).unwrap();

    assert!(body.confirmation_code.starts_with("del_"));
    assert_eq!(
        body.url,
        format!(
            "https://deletion.example.com/deletion-status?code={}",
            body.confirmation_code
        )
    );

    let job = app.jobs.try_recv().unwrap();
    assert_eq!(job.user_id, "u1");
    assert_eq!(job.confirmation_code, body.confirmation_code);
}

#[tokio::test]
async fn test_callback_accepts_json() {
    let mut app = test_app();
    let signed = sign_payload(br#"{"user_id":"u7"}"#, SECRET.as_bytes());

    let request = Request::builder()
        .method("POST")
        .uri(CALLBACK_PATH)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "signed_request": signed }).to_string()))
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.jobs.try_recv().unwrap().user_id, "u7");
}

#[tokio::test]
async fn test_callback_missing_signed_request() {
    let mut app = test_app();
    let response = app
        .router
        .oneshot(form_request("other=1".to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({ "error": "No signed_request" }));
    assert!(app.jobs.try_recv().is_err());
}

#[tokio::test]
async fn test_callback_malformed_signed_request() {
    let mut app = test_app();
    let response = app
        .router
        .oneshot(form_request("signed_request=nodothere".to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "Malformed signed_request" })
    );
    assert!(app.jobs.try_recv().is_err());
}

#[tokio::test]
async fn test_callback_invalid_json_body() {
    let app = test_app();
    let request = Request::builder()
        .method("POST")
        .uri(CALLBACK_PATH)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_bad_signature() {
    let mut app = test_app();
    let signed = sign_payload(br#"{"user_id":"u1"}"#, b"wrong-secret");

    let response = app
        .router
        .oneshot(form_request(format!("signed_request={}", signed)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await, json!({ "error": "Invalid signature" }));
    assert!(app.jobs.try_recv().is_err());
}

#[tokio::test]
async fn test_callback_missing_user_id() {
    let mut app = test_app();
    let signed = sign_payload(br#"{"algorithm":"HMAC-SHA256"}"#, SECRET.as_bytes());

    let response = app
        .router
        .oneshot(form_request(format!("signed_request={}", signed)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "Missing user_id in payload" })
    );
    assert!(app.jobs.try_recv().is_err());
}

#[tokio::test]
async fn test_callback_queue_closed() {
    let app = test_app();
    drop(app.jobs);
    let signed = sign_payload(br#"{"user_id":"u1"}"#, SECRET.as_bytes());

    let response = app
        .router
        .oneshot(form_request(format!("signed_request={}", signed)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({ "error": "Internal server error" })
    );
}

// ============================================================================
// Deletion Status Page
// ============================================================================

#[tokio::test]
async fn test_status_missing_code() {
    let app = test_app();
    let response = app
        .router
        .oneshot(get_request("/deletion-status"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response).await.contains("Missing confirmation code"));
}

#[tokio::test]
async fn test_status_unknown_code_is_processing() {
    let app = test_app();
    let response = app
        .router
        .oneshot(get_request("/deletion-status?code=del_0_unkown"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let page = body_string(response).await;
    assert!(page.contains("being processed"));
    assert!(page.contains("del_0_unkown"));
}

#[tokio::test]
async fn test_status_known_code() {
    let app = test_app();
    let record = DeletionRecord::from_outcome("u1", &DeletionOutcome::deleted(), chrono::Utc::now());
    app.dispatcher.record("del_5_abcdef", &record).await.unwrap();

    let response = app
        .router
        .oneshot(get_request("/deletion-status?code=del_5_abcdef"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let page = body_string(response).await;
    assert!(page.contains("completed"));
    assert!(page.contains("u1"));
    assert!(page.contains("del_5_abcdef"));
}

#[tokio::test]
async fn test_status_store_failure() {
    let app = test_app_with_store(Arc::new(FailingStore::default()));
    let response = app
        .router
        .oneshot(get_request("/deletion-status?code=del_5_abcdef"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_string(response).await.contains("Internal Server Error"));
}

#[tokio::test]
async fn test_status_shows_failed_deletion() {
    let app = test_app_with_store(Arc::new(UsersDownStore::default()));
    let record = app.dispatcher.process("del_6_abcdef", "u1").await;
    assert!(record.message.contains("users collection unavailable"));

    let response = app
        .router
        .oneshot(get_request("/deletion-status?code=del_6_abcdef"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let page = body_string(response).await;
    assert!(page.contains("<b>Status:</b> not_found"));
    assert!(page.contains("users collection unavailable"));
    assert!(page.contains("<b>User ID:</b> u1"));
}
