//! Notification store.
//!
//! Rows are append-only apart from the read flag. History is served newest
//! first with a `created_at` cursor (see [`crate::cursor`]).

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use walwal_common::error::AppError;
use walwal_common::types::{NewNotification, Notification, NotificationType};

use crate::cursor::{decode_cursor, encode_cursor};

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: i64 = 100;

pub trait NotificationStore: Send + Sync + 'static {
    /// Insert one row. Never merges with an existing row.
    fn save(
        &self,
        notification: &NewNotification,
    ) -> impl Future<Output = Result<Notification, AppError>> + Send;

    /// Insert one row unless a row with the same target, type and title
    /// exists. The check and the insert are atomic with respect to concurrent
    /// callers; `Ok(None)` means the row was already there.
    fn save_unless_exists(
        &self,
        notification: &NewNotification,
    ) -> impl Future<Output = Result<Option<Notification>, AppError>> + Send;

    fn exists_by_target_and_type_and_title(
        &self,
        target_id: Uuid,
        notification_type: NotificationType,
        title: &str,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Up to `limit` rows for `recipient_id`, newest first, strictly older
    /// than `before` when given.
    fn fetch_page(
        &self,
        recipient_id: Uuid,
        before: Option<DateTime<Utc>>,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<Notification>, AppError>> + Send;

    /// Whether `recipient_id` has any row strictly older than `created_at`.
    fn exists_before(
        &self,
        recipient_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Set `is_read`. Errors with `NotFound` unless the row belongs to
    /// `recipient_id`; marking an already read row is a no-op.
    fn mark_read(
        &self,
        notification_id: Uuid,
        recipient_id: Uuid,
    ) -> impl Future<Output = Result<Notification, AppError>> + Send;
}

/// One page of notification history.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationPage {
    pub items: Vec<Notification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Serve one page of a recipient's history.
///
/// A missing cursor means the most recent page. `next_cursor` is set only
/// when an older row exists beyond the last returned item.
pub async fn page_by_recipient<S: NotificationStore>(
    store: &S,
    recipient_id: Uuid,
    cursor: Option<&str>,
    limit: i64,
) -> Result<NotificationPage, AppError> {
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }

    let before = cursor.map(decode_cursor).transpose()?;
    let items = store.fetch_page(recipient_id, before, limit).await?;

    let mut next_cursor = None;
    if let Some(last) = items.last()
        && store.exists_before(recipient_id, last.created_at).await?
    {
        next_cursor = Some(encode_cursor(last.created_at));
    }

    Ok(NotificationPage { items, next_cursor })
}

/// PostgreSQL-backed notification store.
#[derive(Clone)]
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const NOTIFICATION_COLUMNS: &str = "id, notification_type, title, message, target_id, recipient_id, is_read, deep_link, created_at";

impl NotificationStore for PgNotificationStore {
    async fn save(&self, notification: &NewNotification) -> Result<Notification, AppError> {
        let row: Notification = sqlx::query_as(&format!(
            r#"
            INSERT INTO notifications (id, notification_type, title, message, target_id, recipient_id, deep_link)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(notification.notification_type)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.target_id)
        .bind(notification.recipient_id)
        .bind(&notification.deep_link)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn save_unless_exists(
        &self,
        notification: &NewNotification,
    ) -> Result<Option<Notification>, AppError> {
        let key = format!(
            "{}:{}:{}",
            notification
                .target_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            notification.notification_type,
            notification.title
        );

        let mut tx = self.pool.begin().await?;

        // Serializes concurrent evaluations of the same milestone until commit.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(&key)
            .execute(&mut *tx)
            .await?;

        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM notifications
                WHERE target_id IS NOT DISTINCT FROM $1 AND notification_type = $2 AND title = $3
            )
            "#,
        )
        .bind(notification.target_id)
        .bind(notification.notification_type)
        .bind(&notification.title)
        .fetch_one(&mut *tx)
        .await?;

        if exists {
            tx.rollback().await?;
            return Ok(None);
        }

        let row: Notification = sqlx::query_as(&format!(
            r#"
            INSERT INTO notifications (id, notification_type, title, message, target_id, recipient_id, deep_link)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(notification.notification_type)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.target_id)
        .bind(notification.recipient_id)
        .bind(&notification.deep_link)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(row))
    }

    async fn exists_by_target_and_type_and_title(
        &self,
        target_id: Uuid,
        notification_type: NotificationType,
        title: &str,
    ) -> Result<bool, AppError> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM notifications
                WHERE target_id = $1 AND notification_type = $2 AND title = $3
            )
            "#,
        )
        .bind(target_id)
        .bind(notification_type)
        .bind(title)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn fetch_page(
        &self,
        recipient_id: Uuid,
        before: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Notification>, AppError> {
        let rows: Vec<Notification> = sqlx::query_as(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE recipient_id = $1
              AND ($2::timestamptz IS NULL OR created_at < $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#
        ))
        .bind(recipient_id)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn exists_before(
        &self,
        recipient_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM notifications WHERE recipient_id = $1 AND created_at < $2)",
        )
        .bind(recipient_id)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn mark_read(
        &self,
        notification_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<Notification, AppError> {
        let row: Option<Notification> = sqlx::query_as(&format!(
            r#"
            UPDATE notifications SET is_read = TRUE
            WHERE id = $1 AND recipient_id = $2
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(notification_id)
        .bind(recipient_id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| {
            AppError::NotFound(format!("Notification {} not found", notification_id))
        })
    }
}
