//! Live subscription processing.
//!
//! Two states: priming (no block observed yet) and streaming. The first
//! pushed block's height is latched through a oneshot so the orchestrator can
//! anchor the backfill window; after that every pushed block is extracted and
//! written the same way. Any error here is fatal: the subscription delivers
//! data inline, so a failure means the session with the data source is broken
//! and the process should be restarted.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::oneshot;

use crate::cache::HeadCacheWriter;
use crate::events::{extract_para_heads, DecodeError};
use crate::rpc::{ChainSource, RpcError};

#[derive(Debug, Error)]
pub enum LiveError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("event subscription terminated")]
    SubscriptionClosed,
}

pub struct LiveSubscriber {
    source: Arc<dyn ChainSource>,
    writer: HeadCacheWriter,
    para_id: u32,
}

impl LiveSubscriber {
    pub fn new(source: Arc<dyn ChainSource>, writer: HeadCacheWriter, para_id: u32) -> Self {
        Self {
            source,
            writer,
            para_id,
        }
    }

    /// Runs until the subscription terminates or processing fails. The first
    /// observed block's height is sent through `started` exactly once.
    pub async fn run(self, started: oneshot::Sender<u64>) -> Result<(), LiveError> {
        let mut rx = self.source.subscribe_events().await?;
        let mut started = Some(started);

        loop {
            let Some(batch) = rx.recv().await else {
                return Err(LiveError::SubscriptionClosed);
            };

            if let Some(tx) = started.take() {
                let header = self.source.get_header(batch.block).await?;
                tracing::info!(
                    height = header.height,
                    block = %batch.block,
                    "live subscription streaming"
                );
                // The orchestrator may already be shutting down; fine.
                let _ = tx.send(header.height);
            }

            let heads = extract_para_heads(&batch.events, self.para_id)?;
            let written = self.writer.write_heads(&heads, batch.block).await;
            tracing::debug!(
                block = %batch.block,
                matches = heads.len(),
                written,
                "processed pushed block"
            );
        }
    }
}
