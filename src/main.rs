mod backfill;
mod cache;
mod config;
mod events;
mod live;
mod pipeline;
mod rpc;
#[cfg(test)]
mod testutil;

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cache::RedisStore;
use config::Config;
use rpc::NodeClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        para_id = config.para_id,
        window = config.backfill_window,
        concurrency = config.worker_concurrency,
        ttl_secs = config.cache_ttl_secs,
        "starting parahead cache"
    );

    let source = Arc::new(
        NodeClient::connect(&config.node_ws_url, config.rpc_rate_limit)
            .await
            .with_context(|| format!("failed to connect to node at {}", config.node_ws_url))?,
    );
    let store = Arc::new(
        RedisStore::connect(&config.redis_host, config.redis_port)
            .await
            .with_context(|| {
                format!(
                    "failed to connect to redis at {}:{}",
                    config.redis_host, config.redis_port
                )
            })?,
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("ctrl-c received, shutting down");
                cancel.cancel();
            }
        });
    }

    pipeline::run(source, store, config, cancel).await
}
