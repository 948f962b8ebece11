use serde::Deserialize;

use crate::types::BoostTier;

/// Largest batch the outbound queue accepts in a single call.
pub const MAX_PUSH_BATCH_SIZE: usize = 10;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string (outbound push queue)
    pub redis_url: String,

    /// JWT secret for API authentication
    pub jwt_secret: String,

    /// JWT token expiry in hours
    pub jwt_expiry_hours: u64,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// Port the API server binds to (default: 3000)
    pub api_port: u16,

    /// Number of delivery items per transport call (1..=10, default: 10)
    pub push_batch_size: usize,

    /// Upper bound on a single transport call in milliseconds (default: 5000)
    pub push_timeout_ms: u64,

    /// Redis list the outbound push queue lives in
    pub push_queue_key: String,

    /// Boost milestones, ascending by threshold
    pub boost_ladder: Vec<BoostTier>,

    /// FCM HTTP v1 `messages:send` endpoint, used by the push worker
    pub fcm_api_url: Option<String>,

    /// OAuth access token for the FCM endpoint
    pub fcm_access_token: Option<String>,

    /// Tokens not refreshed for this many days are pruned (default: 60)
    pub token_inactive_days: i64,

    /// URI scheme for notification deep links (default: "walwal")
    pub deep_link_scheme: String,

    /// Shared key the scheduler presents on `/api/internal` routes
    pub internal_api_key: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let push_batch_size: usize = std::env::var("PUSH_BATCH_SIZE")
            .unwrap_or_else(|_| MAX_PUSH_BATCH_SIZE.to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("PUSH_BATCH_SIZE must be a valid usize"))?;
        if push_batch_size == 0 || push_batch_size > MAX_PUSH_BATCH_SIZE {
            anyhow::bail!("PUSH_BATCH_SIZE must be between 1 and {MAX_PUSH_BATCH_SIZE}");
        }

        let boost_ladder = match std::env::var("BOOST_LADDER") {
            Ok(raw) => parse_boost_ladder(&raw)?,
            Err(_) => default_boost_ladder(),
        };

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            jwt_secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?,
            jwt_expiry_hours: std::env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("JWT_EXPIRY_HOURS must be a valid u64"))?,
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("API_PORT must be a valid u16"))?,
            push_batch_size,
            push_timeout_ms: std::env::var("PUSH_TIMEOUT_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PUSH_TIMEOUT_MS must be a valid u64"))?,
            push_queue_key: std::env::var("PUSH_QUEUE_KEY")
                .unwrap_or_else(|_| "walwal:push:outbound".to_string()),
            boost_ladder,
            fcm_api_url: std::env::var("FCM_API_URL").ok(),
            fcm_access_token: std::env::var("FCM_ACCESS_TOKEN").ok(),
            token_inactive_days: std::env::var("TOKEN_INACTIVE_DAYS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("TOKEN_INACTIVE_DAYS must be a valid i64"))?,
            deep_link_scheme: std::env::var("DEEP_LINK_SCHEME")
                .unwrap_or_else(|_| "walwal".to_string()),
            internal_api_key: std::env::var("INTERNAL_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
        })
    }
}

/// Parse a JSON array of tiers, e.g.
/// `[{"threshold":10,"label":"first","title":"..","message":".."}]`.
///
/// The result is sorted ascending; duplicate thresholds or titles are rejected.
pub fn parse_boost_ladder(raw: &str) -> anyhow::Result<Vec<BoostTier>> {
    let mut tiers: Vec<BoostTier> = serde_json::from_str(raw)
        .map_err(|e| anyhow::anyhow!("BOOST_LADDER must be a JSON array of tiers: {e}"))?;
    if tiers.is_empty() {
        anyhow::bail!("BOOST_LADDER must contain at least one tier");
    }
    tiers.sort_by_key(|t| t.threshold);
    if tiers.windows(2).any(|w| w[0].threshold == w[1].threshold) {
        anyhow::bail!("BOOST_LADDER thresholds must be unique");
    }
    // Milestones are deduplicated by title, so titles must be distinct too.
    let mut titles: Vec<&str> = tiers.iter().map(|t| t.title.as_str()).collect();
    titles.sort_unstable();
    if titles.windows(2).any(|w| w[0] == w[1]) {
        anyhow::bail!("BOOST_LADDER titles must be unique");
    }
    Ok(tiers)
}

pub fn default_boost_ladder() -> Vec<BoostTier> {
    vec![
        BoostTier {
            threshold: 10,
            label: "first".to_string(),
            title: "Your first boosts arrived".to_string(),
            message: "Friends are cheering your mission on!".to_string(),
        },
        BoostTier {
            threshold: 50,
            label: "popular".to_string(),
            title: "Your record is popular".to_string(),
            message: "Your mission record passed 50 boosts!".to_string(),
        },
        BoostTier {
            threshold: 200,
            label: "super".to_string(),
            title: "Your record is a hit".to_string(),
            message: "Your mission record passed 200 boosts!".to_string(),
        },
    ]
}
