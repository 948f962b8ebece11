//! Delivery pipeline.
//!
//! Each event is handled in one pass:
//! 1. Resolve the audience (comment tree walk, boost ladder, or broadcast query)
//! 2. Guard against re-announcing a boost milestone
//! 3. Persist one notification row per recipient, independently
//! 4. Look up push tokens and hand the deliveries to the batch dispatcher
//!
//! Steps 1-3 are strict and surface errors to the caller. Step 4 is best
//! effort: it logs and reports, it never fails the event.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use walwal_common::config::AppConfig;
use walwal_common::error::AppError;
use walwal_common::types::{
    BoostTier, BroadcastKind, DeliveryItem, NewNotification, Notification, NotificationType,
};
use walwal_notifier::dispatcher::{BatchDispatcher, DispatchReport, DispatchSettings};
use walwal_notifier::tokens::TokenStore;
use walwal_notifier::transport::PushTransport;

use crate::comments::CommentTree;
use crate::deeplink::DeepLinks;
use crate::events::{BoostOutcome, BoostUpdated, BroadcastTrigger, CommentCreated};
use crate::recipients::resolve_comment_recipients;
use crate::records::RecordDirectory;
use crate::store::{NotificationPage, NotificationStore, page_by_recipient};
use crate::threshold::BoostLadder;

/// Pipeline configuration, narrowed from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub dispatch: DispatchSettings,
    pub boost_ladder: Vec<BoostTier>,
    pub deep_link_scheme: String,
    pub token_inactive_days: i64,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            dispatch: DispatchSettings::from_config(config),
            boost_ladder: config.boost_ladder.clone(),
            deep_link_scheme: config.deep_link_scheme.clone(),
            token_inactive_days: config.token_inactive_days,
        }
    }
}

/// What one fan-out produced.
#[derive(Debug, Clone, Default)]
pub struct FanOut {
    /// Rows written, in recipient order.
    pub notifications: Vec<Notification>,
    /// Recipients whose row could not be written. They are not pushed to.
    pub failed_rows: usize,
    pub dispatch: DispatchReport,
}

pub struct DeliveryPipeline<S, R, K, T> {
    store: S,
    records: R,
    tokens: K,
    dispatcher: BatchDispatcher<T, K>,
    ladder: BoostLadder,
    links: DeepLinks,
    token_inactive_days: i64,
}

impl<S, R, K, T> DeliveryPipeline<S, R, K, T>
where
    S: NotificationStore,
    R: RecordDirectory,
    K: TokenStore,
    T: PushTransport,
{
    pub fn new(store: S, records: R, tokens: K, transport: T, settings: PipelineSettings) -> Self {
        Self {
            dispatcher: BatchDispatcher::new(transport, tokens.clone(), settings.dispatch),
            store,
            records,
            tokens,
            ladder: BoostLadder::new(settings.boost_ladder),
            links: DeepLinks::new(settings.deep_link_scheme),
            token_inactive_days: settings.token_inactive_days,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn records(&self) -> &R {
        &self.records
    }

    pub fn tokens(&self) -> &K {
        &self.tokens
    }

    /// Notify everyone the new comment concerns.
    pub async fn on_comment_created(&self, event: &CommentCreated) -> Result<FanOut, AppError> {
        let owner = self
            .records
            .record_owner(event.record_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Mission record {} not found", event.record_id))
            })?;

        let tree = CommentTree::from_nodes(self.records.thread(event.record_id).await?);
        let comment = tree.get(event.comment_id).ok_or_else(|| {
            AppError::NotFound(format!("Comment {} not found", event.comment_id))
        })?;
        let parent = match event.parent_id {
            Some(parent_id) => Some(tree.get(parent_id).ok_or_else(|| {
                AppError::NotFound(format!("Parent comment {} not found", parent_id))
            })?),
            None => None,
        };

        let recipients = resolve_comment_recipients(&tree, comment, parent, owner);
        if recipients.is_empty() {
            tracing::debug!(comment_id = %event.comment_id, "No recipients for comment");
            return Ok(FanOut::default());
        }

        let nickname = self
            .records
            .nickname(event.author_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member {} not found", event.author_id)))?;

        let deep_link = self.links.comment(event.record_id, event.comment_id);
        let rows: Vec<NewNotification> = recipients
            .iter()
            .map(|(&member, &role)| NewNotification {
                notification_type: role.stored_type(),
                title: role.title().to_string(),
                message: format!("{nickname}{}", role.message_suffix()),
                target_id: Some(event.record_id),
                recipient_id: member,
                deep_link: deep_link.clone(),
            })
            .collect();

        let (notifications, failed_rows) = self.persist_all(rows).await?;
        let dispatch = self.deliver(&notifications).await;

        tracing::info!(
            comment_id = %event.comment_id,
            record_id = %event.record_id,
            notified = notifications.len(),
            failed_rows,
            "Comment fan-out finished"
        );

        Ok(FanOut {
            notifications,
            failed_rows,
            dispatch,
        })
    }

    /// Announce the highest boost tier reached by `total_count`, once per record.
    pub async fn on_boost_updated(&self, event: &BoostUpdated) -> Result<BoostOutcome, AppError> {
        let Some(tier) = self.ladder.evaluate(event.total_count) else {
            return Ok(BoostOutcome::BelowThreshold);
        };

        let owner = self
            .records
            .record_owner(event.record_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Mission record {} not found", event.record_id))
            })?;

        let already_notified = || BoostOutcome::AlreadyNotified {
            label: tier.label.clone(),
        };

        if self
            .store
            .exists_by_target_and_type_and_title(event.record_id, NotificationType::Booster, &tier.title)
            .await?
        {
            return Ok(already_notified());
        }

        let row = NewNotification {
            notification_type: NotificationType::Booster,
            title: tier.title.clone(),
            message: tier.message.clone(),
            target_id: Some(event.record_id),
            recipient_id: owner,
            deep_link: self.links.boost(event.record_id, tier.threshold),
        };

        // Another evaluation may have won the race since the check above.
        let Some(notification) = self.store.save_unless_exists(&row).await? else {
            return Ok(already_notified());
        };

        tracing::info!(
            record_id = %event.record_id,
            tier = %tier.label,
            total = event.total_count,
            "Boost milestone reached"
        );

        self.deliver(std::slice::from_ref(&notification)).await;
        Ok(BoostOutcome::Notified(notification))
    }

    /// Run a scheduled broadcast. The audience is computed at call time.
    pub async fn broadcast(
        &self,
        trigger: &BroadcastTrigger,
        now: DateTime<Utc>,
    ) -> Result<FanOut, AppError> {
        if trigger.title.trim().is_empty() || trigger.message.trim().is_empty() {
            return Err(AppError::Validation(
                "Broadcast title and message must not be empty".to_string(),
            ));
        }

        let audience = match trigger.kind {
            BroadcastKind::MissionStart => self.tokens.active_tokens().await?,
            BroadcastKind::MissionReminder => {
                let start = now
                    .date_naive()
                    .and_hms_opt(0, 0, 0)
                    .ok_or_else(|| AppError::Internal("Invalid start of day".to_string()))?
                    .and_utc();
                self.tokens
                    .tokens_with_incomplete_mission(start, start + Duration::days(1))
                    .await?
            }
        };

        let members: BTreeSet<Uuid> = audience.iter().map(|(member, _)| *member).collect();
        let deep_link = self.links.mission();
        let rows: Vec<NewNotification> = members
            .into_iter()
            .map(|member| NewNotification {
                notification_type: trigger.kind.notification_type(),
                title: trigger.title.clone(),
                message: trigger.message.clone(),
                target_id: None,
                recipient_id: member,
                deep_link: deep_link.clone(),
            })
            .collect();

        let (notifications, failed_rows) = self.persist_all(rows).await?;
        let dispatch = self.dispatch_to(&notifications, audience).await;

        tracing::info!(
            kind = ?trigger.kind,
            notified = notifications.len(),
            failed_rows,
            "Broadcast finished"
        );

        Ok(FanOut {
            notifications,
            failed_rows,
            dispatch,
        })
    }

    pub async fn list_notifications(
        &self,
        recipient_id: Uuid,
        cursor: Option<&str>,
        limit: i64,
    ) -> Result<NotificationPage, AppError> {
        page_by_recipient(&self.store, recipient_id, cursor, limit).await
    }

    pub async fn mark_read(
        &self,
        notification_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<Notification, AppError> {
        self.store.mark_read(notification_id, recipient_id).await
    }

    /// Delete tokens not refreshed within the configured inactivity window.
    pub async fn prune_inactive_tokens(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        self.tokens
            .prune_inactive(now - Duration::days(self.token_inactive_days))
            .await
    }

    /// Write every row independently. Fails only when there were rows and
    /// none of them could be written.
    async fn persist_all(
        &self,
        rows: Vec<NewNotification>,
    ) -> Result<(Vec<Notification>, usize), AppError> {
        let mut saved = Vec::with_capacity(rows.len());
        let mut failed = 0usize;
        let mut last_error = None;

        for row in &rows {
            match self.store.save(row).await {
                Ok(notification) => saved.push(notification),
                Err(e) => {
                    tracing::error!(
                        recipient_id = %row.recipient_id,
                        notification_type = %row.notification_type,
                        error = %e,
                        "Failed to persist notification"
                    );
                    failed += 1;
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if saved.is_empty() => Err(e),
            _ => Ok((saved, failed)),
        }
    }

    /// Push the persisted notifications to their recipients' devices.
    async fn deliver(&self, notifications: &[Notification]) -> DispatchReport {
        if notifications.is_empty() {
            return DispatchReport::default();
        }

        let members: Vec<Uuid> = notifications
            .iter()
            .map(|n| n.recipient_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        match self.tokens.tokens_for_members(&members).await {
            Ok(tokens) => self.dispatch_to(notifications, tokens).await,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to look up push tokens, skipping delivery");
                DispatchReport::default()
            }
        }
    }

    /// Pair tokens with their member's notification and dispatch. Members
    /// without a persisted notification get nothing.
    async fn dispatch_to(
        &self,
        notifications: &[Notification],
        tokens: Vec<(Uuid, String)>,
    ) -> DispatchReport {
        let by_member: HashMap<Uuid, &Notification> =
            notifications.iter().map(|n| (n.recipient_id, n)).collect();

        let items: Vec<DeliveryItem> = tokens
            .into_iter()
            .filter_map(|(member, token)| {
                by_member.get(&member).map(|n| DeliveryItem {
                    token,
                    title: n.title.clone(),
                    body: n.message.clone(),
                    deep_link: n.deep_link.clone(),
                })
            })
            .collect();

        self.dispatcher.dispatch(&items).await
    }
}
