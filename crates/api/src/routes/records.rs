//! Comment and boost routes on mission records.
//!
//! Both store the member's action first and fan out afterwards. A failed
//! fan-out is logged; the action itself still succeeds.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use walwal_common::error::AppError;
use walwal_common::types::CommentNode;
use walwal_engine::events::{BoostOutcome, BoostUpdated, CommentCreated};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/records/{id}/comments", post(create_comment))
        .route("/api/records/{id}/boosts", post(add_boosts))
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CreateCommentResponse {
    pub comment: CommentNode,
    /// Notification rows written for this comment.
    pub notified: usize,
}

#[derive(Debug, Deserialize)]
pub struct AddBoostsRequest {
    pub count: u32,
}

#[derive(Debug, Serialize)]
pub struct AddBoostsResponse {
    pub total: u64,
    /// Title of the milestone announced by this request, if any.
    pub milestone: Option<String>,
}

/// POST /api/records/{id}/comments
async fn create_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(record_id): Path<Uuid>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CreateCommentResponse>), AppError> {
    let comment = state
        .pipeline
        .records()
        .insert_comment(record_id, auth.member_id, &req.content, req.parent_id)
        .await?;

    let event = CommentCreated::from_comment(&comment, req.content);
    let notified = match state.pipeline.on_comment_created(&event).await {
        Ok(fan_out) => fan_out.notifications.len(),
        Err(e) => {
            tracing::error!(comment_id = %comment.id, error = %e, "Comment fan-out failed");
            0
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(CreateCommentResponse { comment, notified }),
    ))
}

/// POST /api/records/{id}/boosts
async fn add_boosts(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(record_id): Path<Uuid>,
    Json(req): Json<AddBoostsRequest>,
) -> Result<Json<AddBoostsResponse>, AppError> {
    let total = state
        .pipeline
        .records()
        .add_boost(record_id, auth.member_id, req.count)
        .await?;

    let event = BoostUpdated {
        record_id,
        total_count: total,
    };
    let milestone = match state.pipeline.on_boost_updated(&event).await {
        Ok(BoostOutcome::Notified(notification)) => Some(notification.title),
        Ok(BoostOutcome::AlreadyNotified { .. } | BoostOutcome::BelowThreshold) => None,
        Err(e) => {
            tracing::error!(record_id = %record_id, error = %e, "Boost evaluation failed");
            None
        }
    };

    Ok(Json(AddBoostsResponse { total, milestone }))
}
