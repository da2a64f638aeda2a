use alloy_primitives::B256;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::events::EventRecord;
use crate::rpc::client::RpcError;

/// A finalized block's identity and full event log as pushed by the data
/// source's subscription feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockEvents {
    pub block: B256,
    pub events: Vec<EventRecord>,
}

/// The slice of a block header the pipeline needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub height: u64,
}

/// The four data-source operations the pipeline depends on. Implemented by
/// [`NodeClient`](crate::rpc::NodeClient) against a live node and by fakes in
/// tests.
///
/// `subscribe_events` hands back the receiving end of the push feed; the
/// channel closing means the underlying subscription terminated, and dropping
/// the receiver releases it.
#[async_trait]
pub trait ChainSource: Send + Sync {
    async fn get_block_hash(&self, height: u64) -> Result<B256, RpcError>;

    async fn get_header(&self, hash: B256) -> Result<Header, RpcError>;

    async fn get_events(&self, hash: B256) -> Result<Vec<EventRecord>, RpcError>;

    async fn subscribe_events(&self) -> Result<mpsc::Receiver<BlockEvents>, RpcError>;
}
