use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::Key;

/// Where a record lives in the data region.
///
/// `deleted` is authoritative for tombstones: a lookup that lands on a
/// deleted position answers `Deleted` without reading the data region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub start: u64,
    pub len: u64,
    pub deleted: bool,
}

/// An entry of the in-memory sorted key array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: Key,
    pub position: Position,
}

/// Serialize the sparse index region: a JSON object of key → position.
pub fn encode_index(entries: &[IndexEntry]) -> Result<Vec<u8>> {
    let map: BTreeMap<&str, Position> = entries
        .iter()
        .map(|e| (e.key.as_str(), e.position))
        .collect();
    Ok(serde_json::to_vec(&map)?)
}

/// Parse the sparse index region into a key-sorted array.
pub fn decode_index(data: &[u8]) -> Result<Vec<IndexEntry>> {
    let map: BTreeMap<Key, Position> = serde_json::from_slice(data)?;
    Ok(map
        .into_iter()
        .map(|(key, position)| IndexEntry { key, position })
        .collect())
}
