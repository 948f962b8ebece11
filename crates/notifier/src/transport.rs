//! Delivery transport boundary.
//!
//! A transport accepts one bounded batch and reports an outcome per item, in
//! input order. A batch-level `Err` means nothing in the batch is known to
//! have been accepted.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use walwal_common::types::DeliveryItem;

/// Result of handing one item to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Delivered,
    /// Token is invalid or unregistered; the device will never be reached again.
    Unreachable(String),
    /// Any other per-item failure. Dropped after logging.
    Failed(String),
    /// The payload could not be built. The item was left out of its batch.
    SerializationFailed(String),
}

impl ItemOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, ItemOutcome::Delivered)
    }
}

/// Batch-level transport failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Queue error: {0}")]
    Queue(#[from] redis::RedisError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway error: {0}")]
    Gateway(String),
}

/// Something that can take a batch of push deliveries.
pub trait PushTransport: Send + Sync {
    /// Submit one batch. The returned vector is aligned with `batch`.
    fn send_batch(
        &self,
        batch: &[DeliveryItem],
    ) -> impl Future<Output = Result<Vec<ItemOutcome>, TransportError>> + Send;

    /// Short name for logs (e.g., "redis-queue").
    fn name(&self) -> &'static str;
}
