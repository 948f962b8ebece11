//! Lookups into mission records, comments and members.
//!
//! The pipeline only reads through [`RecordDirectory`]; the write helpers on
//! [`PgRecordDirectory`] back the comment and boost endpoints.

use std::future::Future;

use sqlx::PgPool;
use uuid::Uuid;

use walwal_common::error::AppError;
use walwal_common::types::CommentNode;

pub trait RecordDirectory: Send + Sync + 'static {
    /// Owner of the mission record, `None` if the record does not exist.
    fn record_owner(
        &self,
        record_id: Uuid,
    ) -> impl Future<Output = Result<Option<Uuid>, AppError>> + Send;

    /// Every comment on the record.
    fn thread(
        &self,
        record_id: Uuid,
    ) -> impl Future<Output = Result<Vec<CommentNode>, AppError>> + Send;

    fn nickname(
        &self,
        member_id: Uuid,
    ) -> impl Future<Output = Result<Option<String>, AppError>> + Send;
}

#[derive(Clone)]
pub struct PgRecordDirectory {
    pool: PgPool,
}

impl PgRecordDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store a comment after checking the record and, for replies, that the
    /// parent belongs to the same record.
    pub async fn insert_comment(
        &self,
        record_id: Uuid,
        author_id: Uuid,
        content: &str,
        parent_id: Option<Uuid>,
    ) -> Result<CommentNode, AppError> {
        if content.trim().is_empty() {
            return Err(AppError::Validation("Comment content must not be empty".to_string()));
        }

        if self.record_owner(record_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Mission record {} not found",
                record_id
            )));
        }

        if let Some(parent_id) = parent_id {
            let (exists,): (bool,) = sqlx::query_as(
                "SELECT EXISTS(SELECT 1 FROM comments WHERE id = $1 AND record_id = $2)",
            )
            .bind(parent_id)
            .bind(record_id)
            .fetch_one(&self.pool)
            .await?;

            if !exists {
                return Err(AppError::NotFound(format!(
                    "Parent comment {} not found",
                    parent_id
                )));
            }
        }

        let comment: CommentNode = sqlx::query_as(
            r#"
            INSERT INTO comments (id, record_id, parent_id, author_id, content)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, record_id, parent_id, author_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record_id)
        .bind(parent_id)
        .bind(author_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            comment_id = %comment.id,
            record_id = %record_id,
            reply = parent_id.is_some(),
            "Comment created"
        );

        Ok(comment)
    }

    /// Record `count` boosts from `member_id` and return the record's new total.
    pub async fn add_boost(
        &self,
        record_id: Uuid,
        member_id: Uuid,
        count: u32,
    ) -> Result<u64, AppError> {
        if count == 0 {
            return Err(AppError::Validation("Boost count must be positive".to_string()));
        }

        if self.record_owner(record_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Mission record {} not found",
                record_id
            )));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO mission_record_boosts (id, record_id, member_id, count) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(record_id)
        .bind(member_id)
        .bind(i64::from(count))
        .execute(&mut *tx)
        .await?;

        let (total,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(count), 0)::BIGINT FROM mission_record_boosts WHERE record_id = $1",
        )
        .bind(record_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(total.max(0) as u64)
    }
}

impl RecordDirectory for PgRecordDirectory {
    async fn record_owner(&self, record_id: Uuid) -> Result<Option<Uuid>, AppError> {
        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT member_id FROM mission_records WHERE id = $1")
                .bind(record_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(owner,)| owner))
    }

    async fn thread(&self, record_id: Uuid) -> Result<Vec<CommentNode>, AppError> {
        let rows: Vec<CommentNode> = sqlx::query_as(
            r#"
            SELECT id, record_id, parent_id, author_id, created_at
            FROM comments
            WHERE record_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(record_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn nickname(&self, member_id: Uuid) -> Result<Option<String>, AppError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT nickname FROM members WHERE id = $1")
            .bind(member_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(nickname,)| nickname))
    }
}
