use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored classification of a notification row.
///
/// A reply that reaches the record owner is resolved as `RecordReComment`
/// (see [`RecipientRole`]) but persisted with the `ReComment` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    Comment,
    ReComment,
    Booster,
    MissionStart,
    MissionReminder,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationType::Comment => write!(f, "COMMENT"),
            NotificationType::ReComment => write!(f, "RE_COMMENT"),
            NotificationType::Booster => write!(f, "BOOSTER"),
            NotificationType::MissionStart => write!(f, "MISSION_START"),
            NotificationType::MissionReminder => write!(f, "MISSION_REMINDER"),
        }
    }
}

/// Why a member is being told about a new comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipientRole {
    /// Top-level comment on the member's record.
    Comment,
    /// Reply in a thread the member took part in.
    ReComment,
    /// Reply somewhere under the member's own record.
    RecordReComment,
}

impl RecipientRole {
    /// The type the notification row is stored under.
    pub fn stored_type(self) -> NotificationType {
        match self {
            RecipientRole::Comment => NotificationType::Comment,
            RecipientRole::ReComment | RecipientRole::RecordReComment => {
                NotificationType::ReComment
            }
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            RecipientRole::Comment => "New comment",
            RecipientRole::ReComment => "New reply",
            RecipientRole::RecordReComment => "New reply on your record",
        }
    }

    /// Appended to the acting author's nickname to build the message body.
    pub fn message_suffix(self) -> &'static str {
        match self {
            RecipientRole::Comment => " left a comment on your record.",
            RecipientRole::ReComment => " replied to a comment.",
            RecipientRole::RecordReComment => " replied to a comment on your record.",
        }
    }
}

impl std::fmt::Display for RecipientRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecipientRole::Comment => write!(f, "COMMENT"),
            RecipientRole::ReComment => write!(f, "RE_COMMENT"),
            RecipientRole::RecordReComment => write!(f, "RECORD_RE_COMMENT"),
        }
    }
}

/// Scheduled broadcast kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BroadcastKind {
    /// Every member with an active push token.
    MissionStart,
    /// Members whose mission record for today is not completed.
    MissionReminder,
}

impl BroadcastKind {
    pub fn notification_type(self) -> NotificationType {
        match self {
            BroadcastKind::MissionStart => NotificationType::MissionStart,
            BroadcastKind::MissionReminder => NotificationType::MissionReminder,
        }
    }
}

/// Mission record completion status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionRecordStatus {
    NotCompleted,
    InProgress,
    Completed,
}

/// A persisted notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub target_id: Option<Uuid>,
    pub recipient_id: Uuid,
    pub is_read: bool,
    pub deep_link: String,
    pub created_at: DateTime<Utc>,
}

/// A notification about to be written. The store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub target_id: Option<Uuid>,
    pub recipient_id: Uuid,
    pub deep_link: String,
}

/// One node of a record's comment forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommentNode {
    pub id: Uuid,
    pub record_id: Uuid,
    /// `None` for a top-level comment.
    pub parent_id: Option<Uuid>,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A member's push token. `token = None` means logged out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PushToken {
    pub member_id: Uuid,
    pub token: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// One rung of the boost ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostTier {
    /// Total boost count at which this tier is reached.
    pub threshold: u64,
    pub label: String,
    pub title: String,
    pub message: String,
}

/// A single push delivery handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryItem {
    pub token: String,
    pub title: String,
    pub body: String,
    pub deep_link: String,
}
