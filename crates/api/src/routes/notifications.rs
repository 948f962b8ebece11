//! Notification history routes.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use walwal_common::error::AppError;
use walwal_common::types::Notification;
use walwal_engine::store::NotificationPage;

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 20;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/{id}/read", post(mark_read))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

/// GET /api/notifications: Newest first; pass `next_cursor` back as `cursor`.
async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<NotificationPage>, AppError> {
    let page = state
        .pipeline
        .list_notifications(
            auth.member_id,
            query.cursor.as_deref(),
            query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await?;
    Ok(Json(page))
}

/// POST /api/notifications/{id}/read
async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, AppError> {
    let notification = state.pipeline.mark_read(id, auth.member_id).await?;
    Ok(Json(notification))
}
