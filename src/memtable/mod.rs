pub mod manager;

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::types::{Key, Lookup, Record, Value};

pub use manager::MemTableManager;

/// In-memory sorted buffer for writes. Wraps a `BTreeMap` behind a `RwLock`.
///
/// Every write goes here first. Once the record count passes the flush
/// threshold, the memtable is frozen (becomes immutable) and flushed to an
/// SSTable.
///
/// Deletes are handled via tombstones: an entry whose value is `None`.
/// You can't just remove the key because older versions may exist in
/// SSTables on disk, so a delete of a key that was never in memory still
/// inserts a tombstone.
///
/// Any number of concurrent `search` calls; `set`, `delete` and `entries`
/// take the write/read lock for their whole duration.
#[derive(Debug, Default)]
pub struct MemTable {
    data: RwLock<Table>,
}

#[derive(Debug, Default)]
struct Table {
    entries: BTreeMap<Key, Option<Value>>,
    size_bytes: usize,
}

impl Table {
    /// Install `value` for `key`, returning the previous entry if there was one.
    fn upsert(&mut self, key: Key, value: Option<Value>) -> Option<Record> {
        let new_len = value.as_ref().map_or(0, Vec::len);
        match self.entries.get_mut(&key) {
            Some(slot) => {
                let old_len = slot.as_ref().map_or(0, Vec::len);
                let old = std::mem::replace(slot, value);
                self.size_bytes = self.size_bytes - old_len + new_len;
                Some(Record { key, value: old })
            }
            None => {
                self.size_bytes += key.len() + new_len;
                self.entries.insert(key, value);
                None
            }
        }
    }
}

impl MemTable {
    /// Create a new empty memtable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a memtable from records applied in order (later records win).
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mt = MemTable::new();
        for record in records {
            mt.apply(record);
        }
        mt
    }

    /// Look up a key, distinguishing a live value from a tombstone from absence.
    pub fn search(&self, key: &str) -> Lookup {
        match self.data.read().entries.get(key) {
            Some(Some(v)) => Lookup::Found(v.clone()),
            Some(None) => Lookup::Deleted,
            None => Lookup::NotFound,
        }
    }

    /// Insert or update a key. Setting a tombstoned key resurrects it.
    ///
    /// Returns the entry that was replaced (possibly a tombstone), or `None`
    /// if the key was not resident.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Option<Record> {
        self.data.write().upsert(key.into(), Some(value.into()))
    }

    /// Mark a key as deleted. The tombstone is written even when the key was
    /// never resident, so the delete reaches disk on the next flush.
    ///
    /// Returns the entry that was replaced, like [`MemTable::set`].
    pub fn delete(&self, key: impl Into<Key>) -> Option<Record> {
        self.data.write().upsert(key.into(), None)
    }

    /// Apply a record: a tombstone deletes, anything else sets.
    pub fn apply(&self, record: Record) -> Option<Record> {
        self.data.write().upsert(record.key, record.value)
    }

    /// Consistent snapshot of every entry, tombstones included, in key order.
    pub fn entries(&self) -> Vec<Record> {
        self.data
            .read()
            .entries
            .iter()
            .map(|(k, v)| Record {
                key: k.clone(),
                value: v.clone(),
            })
            .collect()
    }

    /// Number of entries, tombstones included.
    pub fn len(&self) -> usize {
        self.data.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().entries.is_empty()
    }

    /// Approximate bytes of keys and values held.
    pub fn size_bytes(&self) -> usize {
        self.data.read().size_bytes
    }
}
