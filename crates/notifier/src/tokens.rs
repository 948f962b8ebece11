//! Push token store.
//!
//! One row per member. A token string belongs to at most one member: when a
//! device changes hands the old association is removed before the new one is
//! written. A `NULL` token means the member logged out on their device.

use std::future::Future;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use walwal_common::error::AppError;
use walwal_common::types::{MissionRecordStatus, PushToken};

/// The one operation the dispatcher needs: dropping a token the gateway
/// reported as unreachable. Deleting a token that is already gone is `Ok(false)`.
pub trait TokenCleanup: Send + Sync {
    fn delete_token(&self, token: &str) -> impl Future<Output = Result<bool, AppError>> + Send;
}

/// Token lookups used by the delivery pipeline.
pub trait TokenStore: TokenCleanup + Clone + 'static {
    /// Active `(member_id, token)` pairs for the given members. Members without
    /// a token are simply absent from the result.
    fn tokens_for_members(
        &self,
        member_ids: &[Uuid],
    ) -> impl Future<Output = Result<Vec<(Uuid, String)>, AppError>> + Send;

    /// Every active `(member_id, token)` pair.
    fn active_tokens(&self) -> impl Future<Output = Result<Vec<(Uuid, String)>, AppError>> + Send;

    /// Active tokens of members with a mission record created in
    /// `[from, until)` that is not completed.
    fn tokens_with_incomplete_mission(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<(Uuid, String)>, AppError>> + Send;

    /// Delete tokens not refreshed since `cutoff`. Returns the number removed.
    fn prune_inactive(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, AppError>> + Send;
}

/// PostgreSQL-backed token store.
#[derive(Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Look up a member's active token.
    pub async fn lookup_token(&self, member_id: Uuid) -> Result<Option<String>, AppError> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT token FROM push_tokens WHERE member_id = $1")
                .bind(member_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row
            .and_then(|(token,)| token)
            .filter(|t| !t.trim().is_empty()))
    }

    /// Register (or replace) the member's token.
    ///
    /// If the same token string is currently held by another member, that row
    /// is deleted first so the token is reassigned rather than duplicated.
    pub async fn register(&self, member_id: Uuid, token: &str) -> Result<PushToken, AppError> {
        if token.trim().is_empty() {
            return Err(AppError::Validation("Push token must not be empty".to_string()));
        }

        let mut tx = self.pool.begin().await?;

        let reassigned = sqlx::query("DELETE FROM push_tokens WHERE token = $1 AND member_id <> $2")
            .bind(token)
            .bind(member_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let stored: PushToken = sqlx::query_as(
            r#"
            INSERT INTO push_tokens (member_id, token, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (member_id) DO UPDATE SET token = EXCLUDED.token, updated_at = NOW()
            RETURNING member_id, token, updated_at
            "#,
        )
        .bind(member_id)
        .bind(token)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            member_id = %member_id,
            reassigned = reassigned > 0,
            "Push token registered"
        );

        Ok(stored)
    }

    /// Clear the member's token on logout. The row is kept so a later refresh
    /// or registration can reuse it.
    pub async fn invalidate_for_member(&self, member_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE push_tokens SET token = NULL, updated_at = NOW() WHERE member_id = $1",
        )
        .bind(member_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Push token for member {} not found",
                member_id
            )));
        }

        tracing::info!(member_id = %member_id, "Push token invalidated");
        Ok(())
    }

    /// Bump `updated_at` so the token survives inactivity pruning.
    pub async fn refresh(&self, member_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE push_tokens SET updated_at = NOW() WHERE member_id = $1")
            .bind(member_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Push token for member {} not found",
                member_id
            )));
        }

        Ok(())
    }
}

impl TokenCleanup for PgTokenStore {
    async fn delete_token(&self, token: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM push_tokens WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl TokenStore for PgTokenStore {
    async fn tokens_for_members(&self, member_ids: &[Uuid]) -> Result<Vec<(Uuid, String)>, AppError> {
        if member_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<(Uuid, String)> = sqlx::query_as(
            r#"
            SELECT member_id, token
            FROM push_tokens
            WHERE member_id = ANY($1)
              AND token IS NOT NULL
              AND btrim(token) <> ''
            "#,
        )
        .bind(member_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn active_tokens(&self) -> Result<Vec<(Uuid, String)>, AppError> {
        let rows: Vec<(Uuid, String)> = sqlx::query_as(
            r#"
            SELECT pt.member_id, pt.token
            FROM push_tokens pt
            JOIN members m ON m.id = pt.member_id
            WHERE pt.token IS NOT NULL
              AND btrim(pt.token) <> ''
              AND m.status = 'NORMAL'
            ORDER BY pt.member_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn tokens_with_incomplete_mission(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<(Uuid, String)>, AppError> {
        let rows: Vec<(Uuid, String)> = sqlx::query_as(
            r#"
            SELECT DISTINCT pt.member_id, pt.token
            FROM mission_records mr
            JOIN push_tokens pt ON pt.member_id = mr.member_id
            JOIN members m ON m.id = mr.member_id
            WHERE mr.created_at >= $1
              AND mr.created_at < $2
              AND mr.status <> $3
              AND m.status = 'NORMAL'
              AND pt.token IS NOT NULL
              AND btrim(pt.token) <> ''
            ORDER BY pt.member_id
            "#,
        )
        .bind(from)
        .bind(until)
        .bind(MissionRecordStatus::Completed)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn prune_inactive(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM push_tokens WHERE updated_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected();
        tracing::info!(removed, cutoff = %cutoff, "Inactive push tokens pruned");
        Ok(removed)
    }
}
