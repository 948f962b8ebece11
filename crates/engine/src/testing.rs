//! In-memory stand-ins for the Postgres stores and the push transport.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use walwal_common::error::AppError;
use walwal_common::types::{CommentNode, DeliveryItem, NewNotification, Notification, NotificationType};
use walwal_notifier::tokens::{TokenCleanup, TokenStore};
use walwal_notifier::transport::{ItemOutcome, PushTransport, TransportError};

use crate::cursor::truncate_to_cursor_precision;
use crate::records::RecordDirectory;
use crate::store::NotificationStore;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

#[derive(Default)]
struct StoreState {
    rows: Vec<Notification>,
    ticks: i64,
    failing_recipients: HashSet<Uuid>,
}

/// Notification store with a strictly increasing fake clock.
#[derive(Clone, Default)]
pub struct MemoryNotificationStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryNotificationStore {
    pub fn all(&self) -> Vec<Notification> {
        self.state.lock().unwrap().rows.clone()
    }

    /// Make every save for `recipient` fail.
    pub fn fail_for(&self, recipient: Uuid) {
        self.state.lock().unwrap().failing_recipients.insert(recipient);
    }

    fn insert(state: &mut StoreState, row: &NewNotification) -> Result<Notification, AppError> {
        if state.failing_recipients.contains(&row.recipient_id) {
            return Err(AppError::Internal("simulated write failure".to_string()));
        }
        state.ticks += 1;
        let notification = Notification {
            id: Uuid::new_v4(),
            notification_type: row.notification_type,
            title: row.title.clone(),
            message: row.message.clone(),
            target_id: row.target_id,
            recipient_id: row.recipient_id,
            is_read: false,
            deep_link: row.deep_link.clone(),
            created_at: truncate_to_cursor_precision(
                base_time() + Duration::milliseconds(state.ticks),
            ),
        };
        state.rows.push(notification.clone());
        Ok(notification)
    }
}

impl NotificationStore for MemoryNotificationStore {
    async fn save(&self, notification: &NewNotification) -> Result<Notification, AppError> {
        let mut state = self.state.lock().unwrap();
        Self::insert(&mut state, notification)
    }

    async fn save_unless_exists(
        &self,
        notification: &NewNotification,
    ) -> Result<Option<Notification>, AppError> {
        let mut state = self.state.lock().unwrap();
        let exists = state.rows.iter().any(|n| {
            n.target_id == notification.target_id
                && n.notification_type == notification.notification_type
                && n.title == notification.title
        });
        if exists {
            return Ok(None);
        }
        Self::insert(&mut state, notification).map(Some)
    }

    async fn exists_by_target_and_type_and_title(
        &self,
        target_id: Uuid,
        notification_type: NotificationType,
        title: &str,
    ) -> Result<bool, AppError> {
        Ok(self.state.lock().unwrap().rows.iter().any(|n| {
            n.target_id == Some(target_id)
                && n.notification_type == notification_type
                && n.title == title
        }))
    }

    async fn fetch_page(
        &self,
        recipient_id: Uuid,
        before: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Notification>, AppError> {
        let mut rows: Vec<Notification> = self
            .state
            .lock()
            .unwrap()
            .rows
            .iter()
            .filter(|n| n.recipient_id == recipient_id)
            .filter(|n| before.is_none_or(|b| n.created_at < b))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn exists_before(
        &self,
        recipient_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .rows
            .iter()
            .any(|n| n.recipient_id == recipient_id && n.created_at < created_at))
    }

    async fn mark_read(
        &self,
        notification_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<Notification, AppError> {
        let mut state = self.state.lock().unwrap();
        let row = state
            .rows
            .iter_mut()
            .find(|n| n.id == notification_id && n.recipient_id == recipient_id)
            .ok_or_else(|| AppError::NotFound(format!("Notification {notification_id} not found")))?;
        row.is_read = true;
        Ok(row.clone())
    }
}

#[derive(Default)]
struct RecordsState {
    owners: HashMap<Uuid, Uuid>,
    nicknames: HashMap<Uuid, String>,
    comments: Vec<CommentNode>,
}

#[derive(Clone, Default)]
pub struct MemoryRecords {
    state: Arc<Mutex<RecordsState>>,
}

impl MemoryRecords {
    pub fn with_member(self, member: Uuid, nickname: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .nicknames
            .insert(member, nickname.to_string());
        self
    }

    pub fn with_record(self, record: Uuid, owner: Uuid) -> Self {
        self.state.lock().unwrap().owners.insert(record, owner);
        self
    }

    pub fn add_comment(
        &self,
        id: Uuid,
        record: Uuid,
        parent: Option<Uuid>,
        author: Uuid,
    ) -> CommentNode {
        let mut state = self.state.lock().unwrap();
        let node = CommentNode {
            id,
            record_id: record,
            parent_id: parent,
            author_id: author,
            created_at: base_time() + Duration::seconds(state.comments.len() as i64),
        };
        state.comments.push(node.clone());
        node
    }
}

impl RecordDirectory for MemoryRecords {
    async fn record_owner(&self, record_id: Uuid) -> Result<Option<Uuid>, AppError> {
        Ok(self.state.lock().unwrap().owners.get(&record_id).copied())
    }

    async fn thread(&self, record_id: Uuid) -> Result<Vec<CommentNode>, AppError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .comments
            .iter()
            .filter(|c| c.record_id == record_id)
            .cloned()
            .collect())
    }

    async fn nickname(&self, member_id: Uuid) -> Result<Option<String>, AppError> {
        Ok(self.state.lock().unwrap().nicknames.get(&member_id).cloned())
    }
}

#[derive(Default)]
struct TokensState {
    tokens: HashMap<Uuid, (String, DateTime<Utc>)>,
    incomplete_missions: Vec<(Uuid, DateTime<Utc>)>,
}

/// Token store; clones share state so the dispatcher's cleanup is observable.
#[derive(Clone, Default)]
pub struct MemoryTokens {
    state: Arc<Mutex<TokensState>>,
}

impl MemoryTokens {
    pub fn set(&self, member: Uuid, token: &str) {
        self.set_at(member, token, base_time());
    }

    pub fn set_at(&self, member: Uuid, token: &str, updated_at: DateTime<Utc>) {
        self.state
            .lock()
            .unwrap()
            .tokens
            .insert(member, (token.to_string(), updated_at));
    }

    pub fn add_incomplete_mission(&self, member: Uuid, created_at: DateTime<Utc>) {
        self.state
            .lock()
            .unwrap()
            .incomplete_missions
            .push((member, created_at));
    }

    pub fn token_of(&self, member: Uuid) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .tokens
            .get(&member)
            .map(|(token, _)| token.clone())
    }

    fn sorted(pairs: impl Iterator<Item = (Uuid, String)>) -> Vec<(Uuid, String)> {
        let mut pairs: Vec<(Uuid, String)> = pairs.collect();
        pairs.sort();
        pairs
    }
}

impl TokenCleanup for MemoryTokens {
    async fn delete_token(&self, token: &str) -> Result<bool, AppError> {
        let mut state = self.state.lock().unwrap();
        let before = state.tokens.len();
        state.tokens.retain(|_, (t, _)| t.as_str() != token);
        Ok(state.tokens.len() < before)
    }
}

impl TokenStore for MemoryTokens {
    async fn tokens_for_members(&self, member_ids: &[Uuid]) -> Result<Vec<(Uuid, String)>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(Self::sorted(member_ids.iter().filter_map(|member| {
            state
                .tokens
                .get(member)
                .map(|(token, _)| (*member, token.clone()))
        })))
    }

    async fn active_tokens(&self) -> Result<Vec<(Uuid, String)>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(Self::sorted(
            state
                .tokens
                .iter()
                .map(|(member, (token, _))| (*member, token.clone())),
        ))
    }

    async fn tokens_with_incomplete_mission(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<(Uuid, String)>, AppError> {
        let state = self.state.lock().unwrap();
        let members: HashSet<Uuid> = state
            .incomplete_missions
            .iter()
            .filter(|(_, at)| *at >= from && *at < until)
            .map(|(member, _)| *member)
            .collect();
        Ok(Self::sorted(members.into_iter().filter_map(|member| {
            state
                .tokens
                .get(&member)
                .map(|(token, _)| (member, token.clone()))
        })))
    }

    async fn prune_inactive(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let mut state = self.state.lock().unwrap();
        let before = state.tokens.len();
        state.tokens.retain(|_, (_, updated_at)| *updated_at >= cutoff);
        Ok((before - state.tokens.len()) as u64)
    }
}

#[derive(Default)]
struct TransportState {
    batches: Vec<Vec<DeliveryItem>>,
    fail_all: bool,
    unreachable: HashSet<String>,
}

/// Records every batch; can fail all batches or flag tokens as unreachable.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    state: Arc<Mutex<TransportState>>,
}

impl RecordingTransport {
    pub fn failing() -> Self {
        let transport = Self::default();
        transport.state.lock().unwrap().fail_all = true;
        transport
    }

    pub fn with_unreachable<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Self {
        let transport = Self::default();
        transport
            .state
            .lock()
            .unwrap()
            .unreachable
            .extend(tokens.into_iter().map(str::to_string));
        transport
    }

    pub fn batches(&self) -> Vec<Vec<DeliveryItem>> {
        self.state.lock().unwrap().batches.clone()
    }

    /// Every token submitted, in submission order.
    pub fn tokens(&self) -> Vec<String> {
        self.batches()
            .into_iter()
            .flatten()
            .map(|item| item.token)
            .collect()
    }
}

impl PushTransport for RecordingTransport {
    async fn send_batch(&self, batch: &[DeliveryItem]) -> Result<Vec<ItemOutcome>, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.batches.push(batch.to_vec());
        if state.fail_all {
            return Err(TransportError::Gateway("simulated outage".to_string()));
        }
        Ok(batch
            .iter()
            .map(|item| {
                if state.unreachable.contains(&item.token) {
                    ItemOutcome::Unreachable("UNREGISTERED".to_string())
                } else {
                    ItemOutcome::Delivered
                }
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
