//! Push worker: drains the outbound Redis queue into the push gateway.

use std::time::Duration;

use walwal_common::types::DeliveryItem;

use crate::dispatcher::{BatchDispatcher, DispatchReport};
use crate::redis_queue::RedisQueueTransport;
use crate::tokens::TokenCleanup;
use crate::transport::{PushTransport, TransportError};

pub struct PushWorker<T, C> {
    queue: RedisQueueTransport,
    dispatcher: BatchDispatcher<T, C>,
    idle_interval: Duration,
}

impl<T: PushTransport, C: TokenCleanup> PushWorker<T, C> {
    pub fn new(
        queue: RedisQueueTransport,
        dispatcher: BatchDispatcher<T, C>,
        idle_interval: Duration,
    ) -> Self {
        Self {
            queue,
            dispatcher,
            idle_interval,
        }
    }

    /// Pop one batch and deliver it. Returns `None` when the queue was empty.
    pub async fn drain_once(&self) -> Result<Option<DispatchReport>, TransportError> {
        let pushes = self
            .queue
            .pop_batch(self.dispatcher.settings().batch_size)
            .await?;
        if pushes.is_empty() {
            return Ok(None);
        }

        let items: Vec<DeliveryItem> = pushes.into_iter().map(|p| p.item).collect();
        Ok(Some(self.dispatcher.dispatch(&items).await))
    }

    /// Run until the task is cancelled.
    pub async fn run(&self) -> anyhow::Result<()> {
        let backlog = self.queue.depth().await?;
        tracing::info!(
            queue = %self.queue.queue_key(),
            batch_size = self.dispatcher.settings().batch_size,
            backlog,
            "Push worker started"
        );

        loop {
            match self.drain_once().await {
                Ok(Some(_)) => continue,
                Ok(None) => tokio::time::sleep(self.idle_interval).await,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read outbound push queue, backing off");
                    tokio::time::sleep(self.idle_interval).await;
                }
            }
        }
    }
}
