//! Durable outbound push queue on a Redis list.
//!
//! The API side enqueues with `RPUSH` inside an atomic pipeline, one entry per
//! delivery item; the push worker drains with `LPOP key count`.

use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use walwal_common::types::DeliveryItem;

use crate::transport::{ItemOutcome, PushTransport, TransportError};

/// Envelope stored in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedPush {
    pub id: Uuid,
    pub enqueued_at: DateTime<Utc>,
    #[serde(flatten)]
    pub item: DeliveryItem,
}

impl QueuedPush {
    pub fn new(item: DeliveryItem) -> Self {
        Self {
            id: Uuid::new_v4(),
            enqueued_at: Utc::now(),
            item,
        }
    }
}

/// Transport that appends each batch to the outbound Redis list.
#[derive(Clone)]
pub struct RedisQueueTransport {
    redis: ConnectionManager,
    queue_key: String,
}

impl RedisQueueTransport {
    pub fn new(redis: ConnectionManager, queue_key: impl Into<String>) -> Self {
        Self {
            redis,
            queue_key: queue_key.into(),
        }
    }

    pub fn queue_key(&self) -> &str {
        &self.queue_key
    }

    /// Pop up to `count` queued pushes. Entries that fail to parse are logged
    /// and discarded.
    pub async fn pop_batch(&self, count: usize) -> Result<Vec<QueuedPush>, TransportError> {
        let mut conn = self.redis.clone();
        let raw: Option<Vec<String>> = redis::cmd("LPOP")
            .arg(&self.queue_key)
            .arg(count)
            .query_async(&mut conn)
            .await?;

        Ok(raw
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| match serde_json::from_str::<QueuedPush>(&entry) {
                Ok(push) => Some(push),
                Err(e) => {
                    tracing::error!(error = %e, "Dropping malformed queued push");
                    None
                }
            })
            .collect())
    }

    /// Current queue depth.
    pub async fn depth(&self) -> Result<usize, TransportError> {
        let mut conn = self.redis.clone();
        let depth: usize = redis::cmd("LLEN")
            .arg(&self.queue_key)
            .query_async(&mut conn)
            .await?;
        Ok(depth)
    }
}

impl PushTransport for RedisQueueTransport {
    async fn send_batch(&self, batch: &[DeliveryItem]) -> Result<Vec<ItemOutcome>, TransportError> {
        let (entries, mut outcomes) = encode_batch(batch);

        if entries.is_empty() {
            return Ok(outcomes);
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for (_, body) in &entries {
            pipe.rpush(&self.queue_key, body).ignore();
        }

        let mut conn = self.redis.clone();
        let _: () = pipe.query_async(&mut conn).await?;

        for (index, _) in &entries {
            outcomes[*index] = ItemOutcome::Delivered;
        }

        tracing::debug!(
            queue = %self.queue_key,
            enqueued = entries.len(),
            "Push batch enqueued"
        );

        Ok(outcomes)
    }

    fn name(&self) -> &'static str {
        "redis-queue"
    }
}

/// Serialize each item into its queue envelope.
///
/// Returns the `(index, json)` pairs to enqueue and an outcome vector in which
/// serialization failures are already filled in; the remaining slots are
/// placeholders until the enqueue succeeds.
fn encode_batch(batch: &[DeliveryItem]) -> (Vec<(usize, String)>, Vec<ItemOutcome>) {
    let mut entries = Vec::with_capacity(batch.len());
    let mut outcomes = Vec::with_capacity(batch.len());

    for (index, item) in batch.iter().enumerate() {
        if item.token.trim().is_empty() {
            outcomes.push(ItemOutcome::SerializationFailed(
                "empty push token".to_string(),
            ));
            continue;
        }
        match serde_json::to_string(&QueuedPush::new(item.clone())) {
            Ok(body) => {
                entries.push((index, body));
                outcomes.push(ItemOutcome::Failed("not enqueued".to_string()));
            }
            Err(e) => outcomes.push(ItemOutcome::SerializationFailed(e.to_string())),
        }
    }

    (entries, outcomes)
}
