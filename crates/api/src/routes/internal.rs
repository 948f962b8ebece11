//! Hooks for the external scheduler. Guarded by `X-API-Key`.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use walwal_common::error::AppError;
use walwal_engine::events::BroadcastTrigger;

use crate::middleware::auth::InternalCaller;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/internal/broadcasts", post(broadcast))
        .route("/api/internal/tokens/prune", post(prune_tokens))
}

#[derive(Debug, Serialize)]
pub struct BroadcastResponse {
    pub notified: usize,
    pub failed_rows: usize,
    pub delivered: usize,
    pub failed_batches: usize,
}

/// POST /api/internal/broadcasts: Run a mission start or reminder broadcast.
async fn broadcast(
    State(state): State<AppState>,
    _caller: InternalCaller,
    Json(trigger): Json<BroadcastTrigger>,
) -> Result<Json<BroadcastResponse>, AppError> {
    let fan_out = state.pipeline.broadcast(&trigger, Utc::now()).await?;
    Ok(Json(BroadcastResponse {
        notified: fan_out.notifications.len(),
        failed_rows: fan_out.failed_rows,
        delivered: fan_out.dispatch.delivered,
        failed_batches: fan_out.dispatch.failed_batches,
    }))
}

/// POST /api/internal/tokens/prune
async fn prune_tokens(
    State(state): State<AppState>,
    _caller: InternalCaller,
) -> Result<Json<serde_json::Value>, AppError> {
    let removed = state.pipeline.prune_inactive_tokens(Utc::now()).await?;
    Ok(Json(json!({ "removed": removed })))
}
