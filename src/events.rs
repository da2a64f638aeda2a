//! Event log records and parachain-head extraction.

use alloy_primitives::{Bytes, B256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pallet emitting candidate inclusion events.
pub const INCLUSION_PALLET: &str = "paraInclusion";
/// Event method carrying an included candidate's descriptor.
pub const INCLUSION_METHOD: &str = "CandidateIncluded";

/// Inclusion payload layout: little-endian u32 para id followed by the
/// 32-byte head reference.
const INCLUSION_PAYLOAD_LEN: usize = 36;

/// A single entry in a block's event log as delivered by the data source.
/// Only `paraInclusion.CandidateIncluded` records carry a payload we decode;
/// every other record is skipped untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub pallet: String,
    pub method: String,
    #[serde(default)]
    pub data: Bytes,
}

impl EventRecord {
    pub fn is_inclusion(&self) -> bool {
        self.pallet == INCLUSION_PALLET && self.method == INCLUSION_METHOD
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("inclusion payload has {actual} bytes, expected 36")]
    PayloadLength { actual: usize },
}

/// Returns the head references included for `para_id` in the given event
/// log, in their original relative order. Malformed inclusion payloads are a
/// contract violation by the data source and fail the whole extraction.
pub fn extract_para_heads(records: &[EventRecord], para_id: u32) -> Result<Vec<B256>, DecodeError> {
    let mut heads = Vec::new();
    for record in records {
        if !record.is_inclusion() {
            continue;
        }
        let (id, head) = decode_inclusion(&record.data)?;
        if id == para_id {
            heads.push(head);
        }
    }
    Ok(heads)
}

fn decode_inclusion(data: &[u8]) -> Result<(u32, B256), DecodeError> {
    if data.len() != INCLUSION_PAYLOAD_LEN {
        return Err(DecodeError::PayloadLength { actual: data.len() });
    }
    let mut id_bytes = [0u8; 4];
    id_bytes.copy_from_slice(&data[..4]);
    Ok((u32::from_le_bytes(id_bytes), B256::from_slice(&data[4..])))
}
