//! Bounded-concurrency historical backfill.
//!
//! A fixed number of workers pull pending heights from a shared bounded
//! channel, so outstanding RPC calls never exceed the configured concurrency
//! regardless of range size. A failed height is logged and counted, never
//! retried within the run, and never aborts its siblings.

use std::ops::Range;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::cache::HeadCacheWriter;
use crate::events::{extract_para_heads, DecodeError};
use crate::rpc::{ChainSource, RpcError};

#[derive(Debug, Error)]
enum HeightError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BackfillReport {
    pub processed: u64,
    pub failed: u64,
}

pub struct Backfill {
    source: Arc<dyn ChainSource>,
    writer: HeadCacheWriter,
    para_id: u32,
    concurrency: usize,
}

impl Backfill {
    pub fn new(
        source: Arc<dyn ChainSource>,
        writer: HeadCacheWriter,
        para_id: u32,
        concurrency: usize,
    ) -> Self {
        Self {
            source,
            writer,
            para_id,
            concurrency: concurrency.max(1),
        }
    }

    /// Processes every height in the half-open range, returning only after
    /// each issued height has completed or failed terminally. Cancellation
    /// stops issuing new heights; in-flight work still drains.
    pub async fn run(&self, heights: Range<u64>, cancel: CancellationToken) -> BackfillReport {
        if heights.is_empty() {
            return BackfillReport::default();
        }

        tracing::info!(
            start = heights.start,
            end = heights.end,
            total = heights.end - heights.start,
            concurrency = self.concurrency,
            "starting backfill"
        );

        let (tx, rx) = mpsc::channel::<u64>(self.concurrency);
        let rx = Arc::new(Mutex::new(rx));

        let mut workers: JoinSet<(u64, u64)> = JoinSet::new();
        for _ in 0..self.concurrency {
            let rx = rx.clone();
            let source = self.source.clone();
            let writer = self.writer.clone();
            let para_id = self.para_id;
            workers.spawn(async move {
                let (mut processed, mut failed) = (0u64, 0u64);
                loop {
                    let height = { rx.lock().await.recv().await };
                    let Some(height) = height else { break };
                    match process_height(source.as_ref(), &writer, para_id, height).await {
                        Ok(written) => {
                            processed += 1;
                            tracing::debug!(height, written, "backfilled height");
                        }
                        Err(e) => {
                            failed += 1;
                            tracing::warn!(height, error = %e, "backfill height failed");
                        }
                    }
                }
                (processed, failed)
            });
        }

        let mut issued = 0u64;
        for height in heights {
            if cancel.is_cancelled() {
                tracing::info!(issued, "backfill cancelled, draining in-flight work");
                break;
            }
            tokio::select! {
                res = tx.send(height) => {
                    if res.is_err() {
                        break;
                    }
                    issued += 1;
                }
                _ = cancel.cancelled() => {
                    tracing::info!(issued, "backfill cancelled, draining in-flight work");
                    break;
                }
            }
        }
        // Closing the channel lets idle workers exit; joining them is the
        // drain barrier.
        drop(tx);

        let mut report = BackfillReport::default();
        while let Some(res) = workers.join_next().await {
            match res {
                Ok((processed, failed)) => {
                    report.processed += processed;
                    report.failed += failed;
                }
                Err(e) => tracing::error!(error = %e, "backfill worker panicked"),
            }
        }

        tracing::info!(
            processed = report.processed,
            failed = report.failed,
            "backfill drained"
        );
        report
    }
}

async fn process_height(
    source: &dyn ChainSource,
    writer: &HeadCacheWriter,
    para_id: u32,
    height: u64,
) -> Result<usize, HeightError> {
    let block_hash = source.get_block_hash(height).await?;
    let events = source.get_events(block_hash).await?;
    let heads = extract_para_heads(&events, para_id)?;
    Ok(writer.write_heads(&heads, block_hash).await)
}
