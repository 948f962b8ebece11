//! Events that start a fan-out.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use walwal_common::types::{BroadcastKind, CommentNode, Notification};

/// A comment or reply was stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentCreated {
    pub record_id: Uuid,
    pub comment_id: Uuid,
    pub author_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
}

impl CommentCreated {
    pub fn from_comment(comment: &CommentNode, content: impl Into<String>) -> Self {
        Self {
            record_id: comment.record_id,
            comment_id: comment.id,
            author_id: comment.author_id,
            parent_id: comment.parent_id,
            content: content.into(),
        }
    }
}

/// A record's boost total changed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoostUpdated {
    pub record_id: Uuid,
    pub total_count: u64,
}

/// Scheduler-triggered broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastTrigger {
    pub kind: BroadcastKind,
    pub title: String,
    pub message: String,
}

/// Result of a boost evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum BoostOutcome {
    /// The total has not reached the first tier.
    BelowThreshold,
    /// The reached tier was announced before.
    AlreadyNotified { label: String },
    Notified(Notification),
}
