//! Walwal API server binary entrypoint.

use std::net::SocketAddr;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use walwal_common::config::AppConfig;
use walwal_common::db::{create_pool, run_migrations};
use walwal_common::redis_pool::create_redis_pool;

use walwal_api::routes::create_router;
use walwal_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "walwal_api=debug,walwal_engine=debug,walwal_notifier=debug,tower_http=debug",
            )
        }))
        .init();

    tracing::info!("Starting Walwal API server...");

    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    run_migrations(&pool).await?;
    tracing::info!("Database pool created");

    let redis = create_redis_pool(&config.redis_url).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    let state = AppState::new(pool, redis, config);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
