// ============================
// crates/backend-lib/src/router.rs
// ============================
//! HTTP router for the OTP API.
use axum::{
    extract::{rejection::JsonRejection, State},
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use passreset_common::{IssueRequest, SuccessResponse, VerifyRequest};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::middleware::rate_limit;
use crate::AppState;

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/api/otp/issue", post(issue_handler))
        .route("/api/otp/verify", post(verify_handler))
        .route_layer(from_fn_with_state(Arc::clone(&state), rate_limit));

    Router::new()
        .merge(api)
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::InvalidArgument(rejection.body_text()))
}

/// `POST /api/otp/issue`
pub async fn issue_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<IssueRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    let request = parse_body(payload)?;
    state.otp.issue(&request.identity).await?;
    Ok(Json(SuccessResponse::OK))
}

/// `POST /api/otp/verify`
pub async fn verify_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    let request = parse_body(payload)?;
    state.otp.verify(&request.identity, &request.code).await?;
    Ok(Json(SuccessResponse::OK))
}

/// `GET /health`
pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
