use crate::test_utils::{app_state, wrong_code};
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
};
use passreset_backend_lib::{
    config::{RateLimitSettings, Settings},
    router::create_router,
};
use passreset_common::{ErrorBody, ErrorKind};
use serde_json::{json, Value};
use tower::ServiceExt;

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn error_kind(response: Response) -> ErrorKind {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
    body.error.kind
}

#[tokio::test]
async fn test_issue_and_verify_over_http() {
    let (state, delivery) = app_state(Settings::default());
    let app = create_router(state);

    let response = app
        .clone()
        .oneshot(post("/api/otp/issue", json!({ "identity": "alice@example.com" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "success": true }));

    let code = delivery.last_code_for("alice@example.com").unwrap();

    let response = app
        .clone()
        .oneshot(post(
            "/api/otp/verify",
            json!({ "identity": "alice@example.com", "code": wrong_code(&code) }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_kind(response).await, ErrorKind::Mismatch);

    let response = app
        .clone()
        .oneshot(post(
            "/api/otp/verify",
            json!({ "identity": "alice@example.com", "code": code }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(post(
            "/api/otp/verify",
            json!({ "identity": "alice@example.com", "code": code }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(error_kind(response).await, ErrorKind::AlreadyVerified);
}

#[tokio::test]
async fn test_error_statuses() {
    let (state, _) = app_state(Settings::default());
    let app = create_router(state);

    let response = app
        .clone()
        .oneshot(post("/api/otp/issue", json!({ "identity": "nobody@example.com" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_kind(response).await, ErrorKind::NotRegistered);

    let response = app
        .clone()
        .oneshot(post(
            "/api/otp/verify",
            json!({ "identity": "bob@example.com", "code": "123456" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_kind(response).await, ErrorKind::NotFound);

    let response = app
        .oneshot(post("/api/otp/issue", json!({ "identity": "bogus" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_kind(response).await, ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let (state, _) = app_state(Settings::default());
    let app = create_router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/api/otp/verify")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"identity\": "))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_kind(response).await, ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn test_resend_cooldown_is_too_many_requests() {
    let (state, _) = app_state(Settings::default());
    let app = create_router(state);

    for expected in [StatusCode::OK, StatusCode::TOO_MANY_REQUESTS] {
        let response = app
            .clone()
            .oneshot(post("/api/otp/issue", json!({ "identity": "carol@example.com" })))
            .await
            .unwrap();
        assert_eq!(response.status(), expected);
    }
}

#[tokio::test]
async fn test_request_rate_limit_applies_to_api_only() {
    let settings = Settings {
        rate_limit: RateLimitSettings {
            max_requests: 1,
            window_secs: 60,
        },
        ..Settings::default()
    };
    let (state, _) = app_state(settings);
    let app = create_router(state);

    let first = app
        .clone()
        .oneshot(post("/api/otp/issue", json!({ "identity": "alice@example.com" })))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .clone()
        .oneshot(post("/api/otp/issue", json!({ "identity": "bob@example.com" })))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(error_kind(second).await, ErrorKind::RateLimited);

    let health = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(json_body(health).await, json!({ "status": "ok" }));
}
