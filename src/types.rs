/// Keys are UTF-8 strings compared byte-lexicographically (the `Ord` of `String`).
/// Every sorted structure in the engine relies on this one ordering.
pub type Key = String;

/// Raw value bytes.
pub type Value = Vec<u8>;

/// A single key/value mutation, as held by the memtable, the WAL and SSTables.
///
/// A Delete writes a tombstone. The key isn't removed, it's marked as deleted.
/// `value == None` is the tombstone, so a deleted record never carries a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Key,
    pub value: Option<Value>,
}

impl Record {
    /// A normal put.
    pub fn put(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        Record {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    /// A delete (tombstone marker).
    pub fn tombstone(key: impl Into<Key>) -> Self {
        Record {
            key: key.into(),
            value: None,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }

    /// Approximate in-memory footprint, used for stats.
    pub fn size_bytes(&self) -> usize {
        self.key.len() + self.value.as_ref().map_or(0, Vec::len)
    }
}

/// Outcome of a point lookup in any single source (memtable, SSTable, level chain).
///
/// `Deleted` is distinct from `NotFound`: a tombstone must stop a lookup
/// immediately instead of falling through to older data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(Value),
    Deleted,
    NotFound,
}

impl Lookup {
    /// True when this source has an answer for the key (value or tombstone).
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Lookup::NotFound)
    }

    /// Collapse to the user-facing view: deleted and absent both become `None`.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Lookup::Found(v) => Some(v),
            Lookup::Deleted | Lookup::NotFound => None,
        }
    }
}

impl From<&Record> for Lookup {
    fn from(record: &Record) -> Self {
        match &record.value {
            Some(v) => Lookup::Found(v.clone()),
            None => Lookup::Deleted,
        }
    }
}
