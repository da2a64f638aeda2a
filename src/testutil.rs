//! Shared fakes for module tests: an in-memory chain source and a recording
//! cache store, both injected through the same traits the real clients
//! implement.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use alloy_primitives::{Bytes, B256};
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::cache::{CacheError, CacheStore};
use crate::events::{EventRecord, INCLUSION_METHOD, INCLUSION_PALLET};
use crate::rpc::{BlockEvents, ChainSource, Header, RpcError};

/// Deterministic block hash for a height, so tests can assert cache values.
pub fn block_hash_for(height: u64) -> B256 {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&height.to_be_bytes());
    bytes[31] = 0x5b;
    B256::from(bytes)
}

pub fn inclusion_event(para_id: u32, head: B256) -> EventRecord {
    let mut data = Vec::with_capacity(36);
    data.extend_from_slice(&para_id.to_le_bytes());
    data.extend_from_slice(head.as_slice());
    EventRecord {
        pallet: INCLUSION_PALLET.to_string(),
        method: INCLUSION_METHOD.to_string(),
        data: Bytes::from(data),
    }
}

pub fn other_event() -> EventRecord {
    EventRecord {
        pallet: "system".to_string(),
        method: "ExtrinsicSuccess".to_string(),
        data: Bytes::new(),
    }
}

pub struct FakeSource {
    blocks: HashMap<u64, Vec<EventRecord>>,
    heights_by_hash: HashMap<B256, u64>,
    fail_heights: HashSet<u64>,
    fetch_delay: Duration,
    fetched: Mutex<Vec<u64>>,
    subscription: Mutex<Option<mpsc::Receiver<BlockEvents>>>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            blocks: HashMap::new(),
            heights_by_hash: HashMap::new(),
            fail_heights: HashSet::new(),
            fetch_delay: Duration::ZERO,
            fetched: Mutex::new(Vec::new()),
            subscription: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Registers a block at `height` whose hash is `block_hash_for(height)`.
    pub fn add_block(&mut self, height: u64, events: Vec<EventRecord>) {
        self.heights_by_hash.insert(block_hash_for(height), height);
        self.blocks.insert(height, events);
    }

    pub fn fail_height(&mut self, height: u64) {
        self.fail_heights.insert(height);
    }

    pub fn set_fetch_delay(&mut self, delay: Duration) {
        self.fetch_delay = delay;
    }

    pub fn set_subscription(&mut self, rx: mpsc::Receiver<BlockEvents>) {
        *self.subscription.lock().unwrap() = Some(rx);
    }

    /// Heights that went through `get_block_hash`, in completion order.
    pub fn fetched_heights(&self) -> Vec<u64> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainSource for FakeSource {
    async fn get_block_hash(&self, height: u64) -> Result<B256, RpcError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_heights.contains(&height) {
            return Err(RpcError::Transport("injected fetch failure".to_string()));
        }
        let result = self
            .blocks
            .contains_key(&height)
            .then(|| block_hash_for(height))
            .ok_or(RpcError::BlockNotFound(height));
        if result.is_ok() {
            self.fetched.lock().unwrap().push(height);
        }
        result
    }

    async fn get_header(&self, hash: B256) -> Result<Header, RpcError> {
        self.heights_by_hash
            .get(&hash)
            .map(|&height| Header { height })
            .ok_or_else(|| RpcError::InvalidResponse(format!("unknown block {hash}")))
    }

    async fn get_events(&self, hash: B256) -> Result<Vec<EventRecord>, RpcError> {
        let height = self
            .heights_by_hash
            .get(&hash)
            .ok_or_else(|| RpcError::InvalidResponse(format!("unknown block {hash}")))?;
        Ok(self.blocks[height].clone())
    }

    async fn subscribe_events(&self) -> Result<mpsc::Receiver<BlockEvents>, RpcError> {
        self.subscription
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| RpcError::Transport("no subscription configured".to_string()))
    }
}

#[derive(Default)]
pub struct RecordingStore {
    sets: Mutex<Vec<(String, String, u64)>>,
    fail_keys: Mutex<HashSet<String>>,
}

impl RecordingStore {
    pub fn fail_key(&self, key: &str) {
        self.fail_keys.lock().unwrap().insert(key.to_string());
    }

    /// Every successful set, in order.
    pub fn entries(&self) -> Vec<(String, String, u64)> {
        self.sets.lock().unwrap().clone()
    }

    /// Last value written for a key, mirroring the store's upsert semantics.
    pub fn get(&self, key: &str) -> Option<String> {
        self.sets
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(k, _, _)| k == key)
            .map(|(_, v, _)| v.clone())
    }
}

#[async_trait]
impl CacheStore for RecordingStore {
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        if self.fail_keys.lock().unwrap().contains(key) {
            return Err(CacheError::Redis(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "injected store failure",
            ))));
        }
        self.sets
            .lock()
            .unwrap()
            .push((key.to_string(), value.to_string(), ttl_secs));
        Ok(())
    }
}
