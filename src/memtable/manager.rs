use std::sync::Arc;

use parking_lot::RwLock;

use crate::memtable::MemTable;
use crate::types::Lookup;

/// Holds the active memtable and, while a flush is in flight, the frozen one.
///
/// Reads check active first, then immutable. Freezing is a pointer swap under
/// a short write lock; the frozen table itself is never written again.
#[derive(Debug, Default)]
pub struct MemTableManager {
    slots: RwLock<Slots>,
}

#[derive(Debug, Default)]
struct Slots {
    active: Arc<MemTable>,
    immutable: Option<Arc<MemTable>>,
}

impl MemTableManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a pre-populated active memtable (WAL replay).
    pub fn with_active(active: MemTable) -> Self {
        MemTableManager {
            slots: RwLock::new(Slots {
                active: Arc::new(active),
                immutable: None,
            }),
        }
    }

    /// The memtable currently accepting writes.
    pub fn active(&self) -> Arc<MemTable> {
        Arc::clone(&self.slots.read().active)
    }

    /// The frozen memtable being flushed, if any.
    pub fn immutable(&self) -> Option<Arc<MemTable>> {
        self.slots.read().immutable.clone()
    }

    /// Look up active, then immutable. `NotFound` means neither knows the key.
    pub fn search(&self, key: &str) -> Lookup {
        let (active, immutable) = {
            let slots = self.slots.read();
            (Arc::clone(&slots.active), slots.immutable.clone())
        };
        match active.search(key) {
            Lookup::NotFound => immutable.map_or(Lookup::NotFound, |mt| mt.search(key)),
            resolved => resolved,
        }
    }

    /// Move active into the immutable slot and install a fresh active table.
    ///
    /// Returns the frozen table, or `None` if a previous freeze has not been
    /// cleared yet (only one flush may be in flight).
    pub fn freeze(&self) -> Option<Arc<MemTable>> {
        let mut slots = self.slots.write();
        if slots.immutable.is_some() {
            return None;
        }
        let frozen = std::mem::replace(&mut slots.active, Arc::new(MemTable::new()));
        slots.immutable = Some(Arc::clone(&frozen));
        Some(frozen)
    }

    /// Drop the immutable table once its contents are durable in an SSTable.
    pub fn clear_immutable(&self) {
        self.slots.write().immutable = None;
    }

    pub fn has_immutable(&self) -> bool {
        self.slots.read().immutable.is_some()
    }
}
