use std::sync::Arc;

use alloy_primitives::B256;

use crate::cache::store::{CacheError, CacheStore};

/// Key prefix for head-to-block entries.
pub const KEY_PREFIX: &str = "para-head:";

/// Writes head-reference -> including-block entries into the external store.
/// Entries are idempotent and expire via the store's TTL; a failed write is
/// logged and reported to the caller but never retried here.
#[derive(Clone)]
pub struct HeadCacheWriter {
    store: Arc<dyn CacheStore>,
    ttl_secs: u64,
}

impl HeadCacheWriter {
    pub fn new(store: Arc<dyn CacheStore>, ttl_secs: u64) -> Self {
        Self { store, ttl_secs }
    }

    pub fn cache_key(head: B256) -> String {
        format!("{KEY_PREFIX}{}", hex::encode(head))
    }

    pub async fn write(&self, head: B256, block_hash: B256) -> Result<(), CacheError> {
        let key = Self::cache_key(head);
        let value = hex::encode(block_hash);
        match self.store.set(&key, &value, self.ttl_secs).await {
            Ok(()) => {
                tracing::debug!(%key, block = %block_hash, "cached para head");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(%key, error = %e, "cache write failed, entry skipped");
                Err(e)
            }
        }
    }

    /// Writes every head from one block's extraction, tolerating individual
    /// failures. Returns how many entries landed.
    pub async fn write_heads(&self, heads: &[B256], block_hash: B256) -> usize {
        let mut written = 0;
        for &head in heads {
            if self.write(head, block_hash).await.is_ok() {
                written += 1;
            }
        }
        written
    }
}
