//! Push token registration routes.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use walwal_common::error::AppError;
use walwal_common::types::PushToken;

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/alarm/token",
            post(register_token).delete(invalidate_token),
        )
        .route("/api/alarm/token/refresh", post(refresh_token))
}

#[derive(Debug, Deserialize)]
pub struct RegisterTokenRequest {
    pub token: String,
}

/// POST /api/alarm/token: Store the device token for the current member.
async fn register_token(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<RegisterTokenRequest>,
) -> Result<Json<PushToken>, AppError> {
    let stored = state
        .pipeline
        .tokens()
        .register(auth.member_id, &req.token)
        .await?;
    Ok(Json(stored))
}

/// DELETE /api/alarm/token: Called on logout.
async fn invalidate_token(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .pipeline
        .tokens()
        .invalidate_for_member(auth.member_id)
        .await?;
    Ok(Json(json!({ "invalidated": true })))
}

/// POST /api/alarm/token/refresh: Keep the token out of inactivity pruning.
async fn refresh_token(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, AppError> {
    state.pipeline.tokens().refresh(auth.member_id).await?;
    Ok(Json(json!({ "refreshed": true })))
}
