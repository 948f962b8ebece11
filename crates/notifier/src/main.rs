//! Walwal push worker binary entrypoint.

use std::time::Duration;

use walwal_common::config::AppConfig;
use walwal_common::db::create_pool;
use walwal_common::redis_pool::create_redis_pool;
use walwal_notifier::dispatcher::{BatchDispatcher, DispatchSettings};
use walwal_notifier::fcm::FcmTransport;
use walwal_notifier::redis_queue::RedisQueueTransport;
use walwal_notifier::tokens::PgTokenStore;
use walwal_notifier::worker::PushWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "walwal_notifier=info".into()),
        )
        .json()
        .init();

    tracing::info!("Walwal push worker starting...");

    let config = AppConfig::from_env()?;

    let fcm_api_url = config
        .fcm_api_url
        .clone()
        .ok_or_else(|| anyhow::anyhow!("FCM_API_URL environment variable is required"))?;
    let fcm_access_token = config
        .fcm_access_token
        .clone()
        .ok_or_else(|| anyhow::anyhow!("FCM_ACCESS_TOKEN environment variable is required"))?;

    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    let redis = create_redis_pool(&config.redis_url).await?;

    let settings = DispatchSettings::from_config(&config);
    // The batch timeout must cover one request per item.
    let transport = FcmTransport::new(fcm_api_url, fcm_access_token, settings.timeout)?;
    let dispatcher = BatchDispatcher::new(
        transport,
        PgTokenStore::new(pool),
        DispatchSettings {
            timeout: settings.timeout * settings.batch_size as u32,
            ..settings
        },
    );
    let queue = RedisQueueTransport::new(redis, config.push_queue_key.clone());
    let worker = PushWorker::new(queue, dispatcher, Duration::from_millis(500));

    tokio::select! {
        result = worker.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Push worker exited with error");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    tracing::info!("Walwal push worker stopped.");
    Ok(())
}
