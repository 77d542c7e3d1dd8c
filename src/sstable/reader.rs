use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use crate::bloom::builder::BloomFilterBuilder;
use crate::bloom::BloomFilter;
use crate::error::{Error, Result};
use crate::sstable::footer::Footer;
use crate::sstable::index::{decode_index, IndexEntry};
use crate::types::{Lookup, Record};
use crate::wal::record::decode_record;

/// An opened, immutable SSTable file.
///
/// On open:
/// 1. Read footer (last 40 bytes) → find data and index regions
/// 2. Read and parse the index region → key-sorted `Vec<IndexEntry>`
/// 3. Build the bloom filter from the index keys
/// 4. Ready for queries (records read on demand)
pub struct SSTable {
    /// Path to the SSTable file (for debugging/error messages and deletion).
    path: PathBuf,
    /// Open file handle. Seek + read share one cursor, hence the lock.
    file: Mutex<File>,
    /// Sorted by key; binary searched on every lookup.
    index: Vec<IndexEntry>,
    bloom: BloomFilter,
    footer: Footer,
    file_size: u64,
}

impl SSTable {
    /// Open an SSTable file read-only.
    pub fn open(path: &Path, bloom_false_positive_rate: f64) -> Result<Self> {
        let mut file = File::open(path)?;

        let file_size = file.metadata()?.len();
        if file_size < Footer::SIZE as u64 {
            return Err(Error::Corruption(format!(
                "{}: file too short to contain footer",
                path.display()
            )));
        }

        file.seek(SeekFrom::Start(file_size - Footer::SIZE as u64))?;
        let mut footer_buf = [0u8; Footer::SIZE];
        file.read_exact(&mut footer_buf)?;
        let footer = Footer::decode(&footer_buf, file_size)?;

        file.seek(SeekFrom::Start(footer.index_offset))?;
        let mut index_buf = vec![0u8; footer.index_size as usize];
        file.read_exact(&mut index_buf)?;
        let index = decode_index(&index_buf)?;

        if let Some(bad) = index
            .iter()
            .find(|e| e.position.start.saturating_add(e.position.len) > footer.data_size)
        {
            return Err(Error::Corruption(format!(
                "{}: index entry {:?} points outside the data region",
                path.display(),
                bad.key
            )));
        }

        let mut bloom = BloomFilterBuilder::new(index.len(), bloom_false_positive_rate);
        for entry in &index {
            bloom.add_key(entry.key.as_bytes());
        }

        debug!(path = %path.display(), entries = index.len(), file_size, "opened SSTable");

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            index,
            bloom: bloom.build(),
            footer,
            file_size,
        })
    }

    /// Point lookup.
    ///
    /// 1. Bloom filter says no → `NotFound`
    /// 2. Binary search the sorted index → `NotFound` on miss
    /// 3. Deleted flag → `Deleted` without touching the data region
    /// 4. Otherwise read `{start, len}` from the data region and decode
    pub fn get(&self, key: &str) -> Result<Lookup> {
        if !self.bloom.may_contain(key.as_bytes()) {
            return Ok(Lookup::NotFound);
        }

        let entry = match self.index.binary_search_by(|e| e.key.as_str().cmp(key)) {
            Ok(i) => &self.index[i],
            Err(_) => return Ok(Lookup::NotFound),
        };
        if entry.position.deleted {
            return Ok(Lookup::Deleted);
        }

        let record = self.read_record(entry)?;
        Ok(Lookup::from(&record))
    }

    /// Every record in key order, tombstones included (compaction input).
    pub fn records(&self) -> Result<Vec<Record>> {
        let mut data = vec![0u8; self.footer.data_size as usize];
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(self.footer.data_offset))?;
            file.read_exact(&mut data)?;
        }

        self.index
            .iter()
            .map(|entry| {
                if entry.position.deleted {
                    return Ok(Record::tombstone(entry.key.clone()));
                }
                let start = entry.position.start as usize;
                let end = start + entry.position.len as usize;
                self.check_key(entry, decode_record(&data[start..end])?)
            })
            .collect()
    }

    fn read_record(&self, entry: &IndexEntry) -> Result<Record> {
        let mut buf = vec![0u8; entry.position.len as usize];
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(self.footer.data_offset + entry.position.start))?;
            file.read_exact(&mut buf)?;
        }
        self.check_key(entry, decode_record(&buf)?)
    }

    /// The record at a position must carry the key the index claims.
    fn check_key(&self, entry: &IndexEntry, record: Record) -> Result<Record> {
        if record.key != entry.key {
            return Err(Error::Corruption(format!(
                "{}: index key {:?} points at record for {:?}",
                self.path.display(),
                entry.key,
                record.key
            )));
        }
        Ok(record)
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.index.iter().map(|e| e.key.as_str())
    }

    /// Number of entries, tombstones included.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Whether any entry is a tombstone.
    pub fn has_tombstones(&self) -> bool {
        self.index.iter().any(|e| e.position.deleted)
    }

    pub fn footer(&self) -> &Footer {
        &self.footer
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for SSTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SSTable")
            .field("path", &self.path)
            .field("entries", &self.index.len())
            .field("file_size", &self.file_size)
            .finish()
    }
}
