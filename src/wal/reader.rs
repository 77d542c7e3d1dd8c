use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::memtable::MemTable;
use crate::types::Record;
use crate::wal::record::{decode_header, decode_record, FRAME_HEADER_SIZE, WAL_HEADER_SIZE};

/// Reads WAL records from a file for crash recovery.
///
/// Loads the entire file into memory, checks the header, then iterates
/// frame by frame.
/// On startup every record is applied, in file order, to a fresh memtable:
/// a tombstone deletes, a value sets, so the last operation per key wins.
pub struct WALReader {
    data: Vec<u8>,
}

/// Result of replaying one WAL file.
pub struct Replay {
    pub memtable: MemTable,
    /// Generation from the header; `None` if the file is shorter than one.
    pub generation: Option<u64>,
    /// Number of records applied.
    pub records: usize,
    /// Length of the well-formed prefix of the file.
    pub valid_len: u64,
    /// True when the file ended in a partially written frame.
    pub torn_tail: bool,
}

impl WALReader {
    /// Open a WAL file for reading.
    pub fn new(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        Ok(WALReader { data })
    }

    /// Generation stamped in the header, if a complete header is present.
    pub fn generation(&self) -> Result<Option<u64>> {
        if self.data.len() < WAL_HEADER_SIZE {
            return Ok(None);
        }
        decode_header(&self.data).map(Some)
    }

    /// Create an iterator over all complete frames in the WAL.
    pub fn iter(&self) -> WALIterator<'_> {
        WALIterator {
            data: &self.data,
            offset: 0,
            torn_tail: false,
            failed: false,
        }
    }

    /// Rebuild a memtable from this file. An empty file yields an empty memtable.
    ///
    /// A torn final frame (crash mid-append) is not an error: that write was
    /// never acknowledged. A complete frame that fails to decode is.
    pub fn replay(&self) -> Result<Replay> {
        let memtable = MemTable::new();
        let mut records = 0;
        let mut iter = self.iter();
        for record in iter.by_ref() {
            memtable.apply(record?);
            records += 1;
        }
        Ok(Replay {
            memtable,
            generation: self.generation()?,
            records,
            valid_len: iter.offset() as u64,
            torn_tail: iter.torn_tail(),
        })
    }
}

/// Iterator over WAL frames. Yields records until EOF, a torn tail, or the
/// first undecodable frame (yielded once as an error). A bad header counts
/// as an undecodable frame; a partial one as a torn tail.
pub struct WALIterator<'a> {
    data: &'a [u8],
    offset: usize,
    torn_tail: bool,
    failed: bool,
}

impl WALIterator<'_> {
    /// Byte offset just past the last complete frame consumed.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Whether iteration stopped at a partially written frame.
    pub fn torn_tail(&self) -> bool {
        self.torn_tail
    }
}

impl Iterator for WALIterator<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.torn_tail || self.offset >= self.data.len() {
            return None;
        }

        if self.offset == 0 {
            if self.data.len() < WAL_HEADER_SIZE {
                self.torn_tail = true;
                return None;
            }
            if let Err(e) = decode_header(self.data) {
                self.failed = true;
                return Some(Err(e));
            }
            self.offset = WAL_HEADER_SIZE;
            if self.offset == self.data.len() {
                return None;
            }
        }

        let remaining = &self.data[self.offset..];
        if remaining.len() < FRAME_HEADER_SIZE {
            self.torn_tail = true;
            return None;
        }

        let mut len_bytes = [0u8; FRAME_HEADER_SIZE];
        len_bytes.copy_from_slice(&remaining[..FRAME_HEADER_SIZE]);
        let payload_len = u64::from_le_bytes(len_bytes);

        let available = (remaining.len() - FRAME_HEADER_SIZE) as u64;
        if payload_len > available {
            self.torn_tail = true;
            return None;
        }

        let end = FRAME_HEADER_SIZE + payload_len as usize;
        match decode_record(&remaining[FRAME_HEADER_SIZE..end]) {
            Ok(record) => {
                self.offset += end;
                Some(Ok(record))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
