//! Orchestration: live subscription first, then a backfill window anchored at
//! the first live block so historical and live coverage meet with no gap.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::backfill::Backfill;
use crate::cache::{CacheStore, HeadCacheWriter};
use crate::config::Config;
use crate::live::{LiveError, LiveSubscriber};
use crate::rpc::ChainSource;

/// Runs the cache-population pipeline until cancellation or a fatal live
/// error. Sequencing: the live subscriber starts first; once it has latched
/// its start height, backfill covers `[start - window, start)` and the live
/// feed covers `[start, ..)`.
pub async fn run(
    source: Arc<dyn ChainSource>,
    store: Arc<dyn CacheStore>,
    config: Config,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let writer = HeadCacheWriter::new(store, config.cache_ttl_secs);

    let (start_tx, mut start_rx) = oneshot::channel();
    let mut tasks: JoinSet<Result<(), LiveError>> = JoinSet::new();
    let live = LiveSubscriber::new(source.clone(), writer.clone(), config.para_id);
    tasks.spawn(live.run(start_tx));

    let start_height = tokio::select! {
        res = &mut start_rx => match res {
            Ok(height) => height,
            // Sender dropped: the live task died before observing a block.
            Err(_) => return Err(live_failure(&mut tasks).await),
        },
        Some(res) = tasks.join_next() => return Err(live_exit_error(res)),
        _ = cancel.cancelled() => {
            tasks.shutdown().await;
            return Ok(());
        }
    };

    let from = start_height.saturating_sub(config.backfill_window);
    let backfill = Backfill::new(
        source,
        writer,
        config.para_id,
        config.worker_concurrency,
    );
    let report = backfill.run(from..start_height, cancel.clone()).await;
    tracing::info!(
        from,
        to = start_height,
        processed = report.processed,
        failed = report.failed,
        "caught up, live subscription continues"
    );

    tokio::select! {
        Some(res) = tasks.join_next() => Err(live_exit_error(res)),
        _ = cancel.cancelled() => {
            tracing::info!("shutdown requested, stopping live subscription");
            tasks.shutdown().await;
            Ok(())
        }
    }
}

async fn live_failure(tasks: &mut JoinSet<Result<(), LiveError>>) -> anyhow::Error {
    match tasks.join_next().await {
        Some(res) => live_exit_error(res),
        None => anyhow::anyhow!("live subscriber ended before observing a block"),
    }
}

fn live_exit_error(res: Result<Result<(), LiveError>, JoinError>) -> anyhow::Error {
    match res {
        Ok(Ok(())) => anyhow::anyhow!("live subscriber exited unexpectedly"),
        Ok(Err(e)) => anyhow::Error::new(e).context("live subscription failed"),
        Err(e) => anyhow::Error::new(e).context("live subscriber panicked"),
    }
}
