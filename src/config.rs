use std::env;
use std::num::NonZeroU32;

use anyhow::Context;

/// Three weeks; long enough to outlive any consumer's interest in a head.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 1_814_400;
pub const DEFAULT_BACKFILL_WINDOW: u64 = 50;
pub const DEFAULT_WORKER_CONCURRENCY: usize = 16;

#[derive(Debug, Clone)]
pub struct Config {
    pub node_ws_url: String,
    pub redis_host: String,
    pub redis_port: u16,
    pub para_id: u32,
    pub cache_ttl_secs: u64,
    pub backfill_window: u64,
    pub worker_concurrency: usize,
    pub rpc_rate_limit: Option<NonZeroU32>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        if env::var("NODE_WS_URL").is_err() || env::var("PARA_ID").is_err() {
            // Local runs keep required vars in a .env file.
            let _ = dotenvy::dotenv();
        }

        let node_ws_url = env::var("NODE_WS_URL").context("NODE_WS_URL not set")?;
        let para_id = env::var("PARA_ID")
            .context("PARA_ID not set")?
            .parse()
            .context("PARA_ID must be a u32")?;

        let redis_host = env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let redis_port = env::var("REDIS_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(6379);

        let cache_ttl_secs = env::var("CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CACHE_TTL_SECS);
        let backfill_window = env::var("BACKFILL_WINDOW")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_BACKFILL_WINDOW);
        let worker_concurrency = env::var("WORKER_CONCURRENCY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_WORKER_CONCURRENCY);

        let rpc_rate_limit = env::var("NODE_RPC_RPS")
            .ok()
            .and_then(|s| s.parse().ok())
            .and_then(NonZeroU32::new);

        Ok(Self {
            node_ws_url,
            redis_host,
            redis_port,
            para_id,
            cache_ttl_secs,
            backfill_window,
            worker_concurrency,
            rpc_rate_limit,
        })
    }
}
