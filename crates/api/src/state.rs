//! Shared application state for the Axum API server.

use std::sync::Arc;

use redis::aio::ConnectionManager;
use sqlx::PgPool;

use walwal_common::config::AppConfig;
use walwal_engine::pipeline::{DeliveryPipeline, PipelineSettings};
use walwal_engine::records::PgRecordDirectory;
use walwal_engine::store::PgNotificationStore;
use walwal_notifier::redis_queue::RedisQueueTransport;
use walwal_notifier::tokens::PgTokenStore;

/// The pipeline as wired in production: Postgres stores, Redis outbound queue.
pub type Pipeline =
    DeliveryPipeline<PgNotificationStore, PgRecordDirectory, PgTokenStore, RedisQueueTransport>;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub redis: ConnectionManager,
    pub config: AppConfig,
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pool: PgPool, redis: ConnectionManager, config: AppConfig) -> Self {
        let pipeline = DeliveryPipeline::new(
            PgNotificationStore::new(pool.clone()),
            PgRecordDirectory::new(pool.clone()),
            PgTokenStore::new(pool.clone()),
            RedisQueueTransport::new(redis.clone(), config.push_queue_key.clone()),
            PipelineSettings::from_config(&config),
        );

        Self {
            pool,
            redis,
            config,
            pipeline: Arc::new(pipeline),
        }
    }
}
