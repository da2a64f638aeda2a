use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::B256;
use async_trait::async_trait;
use futures::StreamExt;
use governor::clock::{QuantaClock, QuantaInstant};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Jitter, Quota, RateLimiter};
use jsonrpsee::core::client::{ClientT, Subscription, SubscriptionClientT};
use jsonrpsee::rpc_params;
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;
use url::Url;

use crate::events::EventRecord;
use crate::rpc::source::{BlockEvents, ChainSource, Header};

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("RPC transport error: {0}")]
    Transport(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Block not found at height {0}")]
    BlockNotFound(u64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

pub type StandardRateLimiter =
    RateLimiter<NotKeyed, InMemoryState, QuantaClock, NoOpMiddleware<QuantaInstant>>;

/// Buffered pushed blocks between the subscription pump and the live
/// subscriber. The source delivers roughly one batch per finalized block, so
/// a small buffer is plenty.
const SUBSCRIPTION_BUFFER: usize = 64;

const JITTER_MIN: Duration = Duration::from_millis(5);
const JITTER_MAX: Duration = Duration::from_millis(50);

/// Wire shape of `chain_getHeader`; the block number arrives as a hex string.
#[derive(Debug, Deserialize)]
struct RpcHeader {
    number: String,
}

/// JSON-RPC WebSocket client for the chain data source, with an optional
/// request rate limit for endpoints that meter calls.
pub struct NodeClient {
    client: Arc<WsClient>,
    rate_limiter: Option<Arc<StandardRateLimiter>>,
    jitter: Option<Jitter>,
}

impl NodeClient {
    pub async fn connect(url: &str, rate_limit: Option<NonZeroU32>) -> Result<Self, RpcError> {
        Url::parse(url).map_err(|e| RpcError::InvalidUrl(e.to_string()))?;

        let client = WsClientBuilder::default()
            .build(url)
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let (rate_limiter, jitter) = match rate_limit {
            Some(requests_per_second) => {
                let quota = Quota::per_second(requests_per_second);
                let limiter = RateLimiter::direct(quota);
                (Some(Arc::new(limiter)), Some(Jitter::new(JITTER_MIN, JITTER_MAX)))
            }
            None => (None, None),
        };

        Ok(Self {
            client: Arc::new(client),
            rate_limiter,
            jitter,
        })
    }

    async fn wait_for_rate_limit(&self) {
        if let (Some(limiter), Some(jitter)) = (&self.rate_limiter, &self.jitter) {
            limiter.until_ready_with_jitter(*jitter).await;
        }
    }
}

#[async_trait]
impl ChainSource for NodeClient {
    async fn get_block_hash(&self, height: u64) -> Result<B256, RpcError> {
        self.wait_for_rate_limit().await;
        let hash: Option<B256> = self
            .client
            .request("chain_getBlockHash", rpc_params![height])
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        hash.ok_or(RpcError::BlockNotFound(height))
    }

    async fn get_header(&self, hash: B256) -> Result<Header, RpcError> {
        self.wait_for_rate_limit().await;
        let header: RpcHeader = self
            .client
            .request("chain_getHeader", rpc_params![hash])
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        Ok(Header {
            height: parse_block_number(&header.number)?,
        })
    }

    async fn get_events(&self, hash: B256) -> Result<Vec<EventRecord>, RpcError> {
        self.wait_for_rate_limit().await;
        self.client
            .request("system_getEvents", rpc_params![hash])
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))
    }

    async fn subscribe_events(&self) -> Result<mpsc::Receiver<BlockEvents>, RpcError> {
        self.wait_for_rate_limit().await;
        let mut subscription: Subscription<BlockEvents> = self
            .client
            .subscribe(
                "system_subscribeEvents",
                rpc_params![],
                "system_unsubscribeEvents",
            )
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        tokio::spawn(async move {
            while let Some(item) = subscription.next().await {
                match item {
                    Ok(batch) => {
                        // Receiver dropped: the subscriber unsubscribed.
                        if tx.send(batch).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "event subscription failed");
                        break;
                    }
                }
            }
            // Dropping tx closes the channel, which the live subscriber
            // treats as subscription termination.
        });

        Ok(rx)
    }
}

fn parse_block_number(raw: &str) -> Result<u64, RpcError> {
    let digits = raw.trim_start_matches("0x");
    u64::from_str_radix(digits, 16)
        .map_err(|_| RpcError::InvalidResponse(format!("bad block number {raw:?}")))
}

impl std::fmt::Debug for NodeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeClient")
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish()
    }
}
