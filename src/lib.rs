//! # lsmkv
//!
//! An embedded key-value storage engine using the Log-Structured Merge-Tree
//! design, with leveled compaction.
//!
//! ## Core idea
//! Writes are appended to a write-ahead log and buffered in a sorted
//! memtable. Full memtables are frozen and written out as immutable,
//! sorted SSTable files at level 0; levels that grow too large are merged
//! into the next level down.
//!
//! ```text
//!  put/delete ──► WAL (wal1.log | wal2.log)
//!       │
//!       ▼
//!  active memtable ──freeze──► immutable memtable ──flush──► level 0
//!                                                              │ compact
//!                                                              ▼
//!                                                     level 1 … level 9
//! ```
//!
//! Reads consult the active memtable, the immutable memtable, then every
//! level from 0 to 9, newest table first within a level. The first source
//! holding the key, value or tombstone, decides the answer.

pub mod bloom;
pub mod compaction;
pub mod db;
pub mod error;
pub mod levels;
pub mod memtable;
pub mod options;
pub mod sstable;
pub mod types;
pub mod wal;

pub use db::{Stats, DB};
pub use error::{Error, Result};
pub use options::Options;
pub use types::{Key, Lookup, Record, Value};
pub use wal::SyncPolicy;
