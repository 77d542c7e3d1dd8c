use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::sstable::footer::{Footer, FORMAT_VERSION};
use crate::sstable::index::{encode_index, IndexEntry, Position};
use crate::types::{Key, Record};
use crate::wal::record::encode_record;

/// Builds an SSTable file from a stream of records.
///
/// Used during:
/// - Memtable flush (memtable snapshot → level-0 SSTable)
/// - Compaction (merged level → one SSTable in the next level)
///
/// Build process:
/// 1. Add records one by one; each is appended to the data region in input order
/// 2. The position of every record is remembered for the index
/// 3. finish() writes the index region, then the footer, then fsyncs
pub struct SSTableBuilder {
    writer: BufWriter<File>,
    /// Key → position in the data region. Also rejects duplicate keys.
    positions: BTreeMap<Key, Position>,
    /// Bytes written to the data region so far.
    data_size: u64,
}

/// What `finish` wrote.
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub footer: Footer,
    pub entry_count: usize,
    pub file_size: u64,
}

impl SSTableBuilder {
    /// Create a new SSTable builder that writes to the given path.
    pub fn new(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(SSTableBuilder {
            writer: BufWriter::new(file),
            positions: BTreeMap::new(),
            data_size: 0,
        })
    }

    /// Write a whole snapshot and finish the file.
    pub fn build<'a>(
        path: &Path,
        records: impl IntoIterator<Item = &'a Record>,
    ) -> Result<BuildSummary> {
        let mut builder = SSTableBuilder::new(path)?;
        for record in records {
            builder.add(record)?;
        }
        builder.finish()
    }

    /// Append a record to the data region.
    ///
    /// Returns `false` (and writes nothing) if the key was already added:
    /// an SSTable never holds two entries for one key.
    pub fn add(&mut self, record: &Record) -> Result<bool> {
        if self.positions.contains_key(&record.key) {
            return Ok(false);
        }

        let encoded = encode_record(record);
        self.writer.write_all(&encoded)?;

        self.positions.insert(
            record.key.clone(),
            Position {
                start: self.data_size,
                len: encoded.len() as u64,
                deleted: record.is_tombstone(),
            },
        );
        self.data_size += encoded.len() as u64;
        Ok(true)
    }

    /// Number of records added so far.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Finalize the SSTable: write index region, footer, fsync.
    pub fn finish(mut self) -> Result<BuildSummary> {
        let entry_count = self.positions.len();
        let entries: Vec<IndexEntry> = std::mem::take(&mut self.positions)
            .into_iter()
            .map(|(key, position)| IndexEntry { key, position })
            .collect();

        // 1. Index region right after the data region
        let index_data = encode_index(&entries)?;
        self.writer.write_all(&index_data)?;

        // 2. Footer
        let footer = Footer {
            version: FORMAT_VERSION,
            data_offset: 0,
            data_size: self.data_size,
            index_offset: self.data_size,
            index_size: index_data.len() as u64,
        };
        self.writer.write_all(&footer.encode())?;

        // 3. Flush buffer + fsync to guarantee durability
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;

        let file_size = footer.index_offset + footer.index_size + Footer::SIZE as u64;
        Ok(BuildSummary {
            footer,
            entry_count,
            file_size,
        })
    }
}
