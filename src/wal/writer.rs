use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::memtable::MemTable;
use crate::types::Record;
use crate::wal::reader::WALReader;
use crate::wal::record::{encode_frame, encode_header};
use crate::wal::SyncPolicy;

/// Writes WAL frames to a file on disk.
///
/// Every write must be durable before it's acknowledged to the client.
/// The WAL ensures crash recovery: on restart, replay the WAL to
/// reconstruct the memtable.
///
/// Two layers of buffering:
///   BufWriter.flush()  → Rust buffer → OS page cache
///   file.sync_all()    → OS page cache → physical disk
///
/// The header carrying the generation goes out with the first frame, so an
/// empty log is a zero-length file.
pub struct WALWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    offset: u64,
    generation: u64,
    sync_policy: SyncPolicy,
    writes_since_sync: usize,
}

fn open_append(path: &Path) -> Result<File> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

impl WALWriter {
    /// Open (or create) a WAL file for appending, with generation 0.
    pub fn new(path: &Path, sync_policy: SyncPolicy) -> Result<Self> {
        Self::with_generation(path, 0, sync_policy)
    }

    /// Open (or create) a WAL file for appending. `generation` is written
    /// into the header if the file is still empty; an existing header is
    /// left alone.
    pub fn with_generation(path: &Path, generation: u64, sync_policy: SyncPolicy) -> Result<Self> {
        let file = open_append(path)?;
        let offset = file.metadata()?.len();

        Ok(WALWriter {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            offset,
            generation,
            sync_policy,
            writes_since_sync: 0,
        })
    }

    /// Append a record to the WAL.
    /// Depending on SyncPolicy, may fsync after this write.
    ///
    /// On failure nothing of this record stays behind, neither in the buffer
    /// nor in the file, so a failed append can never be replayed.
    pub fn append(&mut self, record: &Record) -> Result<()> {
        let mut encoded = Vec::new();
        if self.offset == 0 {
            encoded.extend_from_slice(&encode_header(self.generation));
        }
        encoded.extend_from_slice(&encode_frame(record));

        let sync = match self.sync_policy {
            SyncPolicy::EveryWrite => true,
            SyncPolicy::EveryNWrites(n) => self.writes_since_sync + 1 >= n,
        };
        if let Err(e) = self.write_out(&encoded, sync) {
            if let Err(rollback) = self.rollback() {
                error!(
                    path = %self.path.display(),
                    error = %rollback,
                    "rolling back failed WAL append"
                );
            }
            return Err(e);
        }

        self.offset += encoded.len() as u64;
        self.writes_since_sync = if sync { 0 } else { self.writes_since_sync + 1 };
        Ok(())
    }

    fn write_out(&mut self, bytes: &[u8], sync: bool) -> Result<()> {
        self.writer.write_all(bytes)?;
        self.writer.flush()?;
        if sync {
            self.writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    /// Discard buffered bytes of a failed append and cut the file back to
    /// the last good frame.
    fn rollback(&mut self) -> Result<()> {
        let fresh = BufWriter::new(open_append(&self.path)?);
        // into_parts hands the buffer back instead of flushing it.
        let (_file, _unwritten) = std::mem::replace(&mut self.writer, fresh).into_parts();
        let file = self.writer.get_ref();
        if file.metadata()?.len() > self.offset {
            file.set_len(self.offset)?;
            file.sync_all()?;
        }
        Ok(())
    }

    /// Force fsync to disk. Ensures all buffered writes are durable.
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        self.writes_since_sync = 0;
        Ok(())
    }

    /// Discard the log: delete the file and start over with an empty one at
    /// the same path, stamped with `generation` once written to.
    pub fn reset(&mut self, generation: u64) -> Result<()> {
        fs::remove_file(&self.path)?;
        self.writer = BufWriter::new(open_append(&self.path)?);
        self.offset = 0;
        self.generation = generation;
        self.writes_since_sync = 0;
        debug!(path = %self.path.display(), generation, "WAL reset");
        Ok(())
    }

    /// Current file offset (bytes written so far, header included).
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Appends since the last fsync.
    pub fn writes_since_sync(&self) -> usize {
        self.writes_since_sync
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_empty(&self) -> bool {
        self.offset == 0
    }
}

/// File names of the two alternating logs.
pub const WAL_FILE_NAMES: [&str; 2] = ["wal1.log", "wal2.log"];

const WAL_TMP_NAME: &str = "wal.tmp";

/// Owns the two alternating WAL files.
///
/// While one log receives writes, the other is idle (empty). When the
/// memtable is frozen:
/// 1. `switch()`: the idle log becomes active; new writes go there
/// 2. the frozen memtable is flushed to an SSTable and fsync'd
/// 3. `reset(vacated)`: the old log is deleted and recreated empty
///
/// CRITICAL INVARIANT: the vacated log is only reset AFTER its SSTable is
/// fully written and fsync'd. Violating this loses data.
///
/// Every reset hands out a fresh generation, so the idle log always carries
/// a higher generation than the active one. After a crash between `switch`
/// and `reset`, replay order follows the generations.
pub struct WALManager {
    logs: [WALWriter; 2],
    active: usize,
    next_generation: u64,
}

/// Writer for a log that must start out empty.
fn empty_log(path: &Path, generation: u64, sync_policy: SyncPolicy) -> Result<WALWriter> {
    let mut writer = WALWriter::with_generation(path, generation, sync_policy)?;
    if !writer.is_empty() {
        writer.reset(generation)?;
    }
    Ok(writer)
}

struct Recovered {
    id: usize,
    generation: u64,
    memtable: MemTable,
}

impl WALManager {
    /// Open both logs in `dir` and rebuild the memtable they describe.
    ///
    /// Normally at most one log is non-empty. Both are non-empty only after a
    /// crash between `switch` and `reset`; then the log with the lower
    /// generation is replayed first, and the merged state is rewritten into
    /// `wal1.log` so the pair is back to one active, one empty.
    pub fn open(dir: &Path, sync_policy: SyncPolicy) -> Result<(Self, MemTable)> {
        let paths = WAL_FILE_NAMES.map(|name| dir.join(name));
        let mut recovered = Vec::new();
        let mut next_generation = 1;
        for (id, path) in paths.iter().enumerate() {
            if !path.exists() || fs::metadata(path)?.len() == 0 {
                continue;
            }
            let replay = WALReader::new(path)?.replay()?;
            if let Some(generation) = replay.generation {
                next_generation = next_generation.max(generation + 1);
            }
            if replay.torn_tail {
                warn!(
                    path = %path.display(),
                    valid_len = replay.valid_len,
                    "truncating torn WAL tail"
                );
                let file = OpenOptions::new().write(true).open(path)?;
                file.set_len(replay.valid_len)?;
                file.sync_all()?;
            }
            if replay.records > 0 {
                info!(
                    path = %path.display(),
                    records = replay.records,
                    generation = ?replay.generation,
                    "replayed WAL"
                );
                recovered.push(Recovered {
                    id,
                    generation: replay.generation.unwrap_or_default(),
                    memtable: replay.memtable,
                });
            }
        }
        recovered.sort_by_key(|r| r.generation);

        // At most two fresh generations are needed below.
        let (first, second) = (next_generation, next_generation + 1);
        let (logs, active, memtable) = match (recovered.pop(), recovered.pop()) {
            (None, _) => (
                [
                    empty_log(&paths[0], first, sync_policy)?,
                    empty_log(&paths[1], second, sync_policy)?,
                ],
                0,
                MemTable::new(),
            ),
            (Some(only), None) => {
                let live = WALWriter::with_generation(&paths[only.id], only.generation, sync_policy)?;
                let idle = empty_log(&paths[1 - only.id], first, sync_policy)?;
                let logs = if only.id == 0 { [live, idle] } else { [idle, live] };
                (logs, only.id, only.memtable)
            }
            (Some(newer), Some(older)) => {
                if older.generation == newer.generation {
                    return Err(Error::Corruption(format!(
                        "both WAL files carry generation {}",
                        older.generation
                    )));
                }
                let merged = older.memtable;
                for record in newer.memtable.entries() {
                    merged.apply(record);
                }
                Self::consolidate(dir, &merged, first)?;
                let live = WALWriter::with_generation(&paths[0], first, sync_policy)?;
                let idle = empty_log(&paths[1], second, sync_policy)?;
                ([live, idle], 0, merged)
            }
        };

        Ok((
            WALManager {
                logs,
                active,
                next_generation: second + 1,
            },
            memtable,
        ))
    }

    /// Write `memtable` into a temp file stamped with `generation`, then
    /// rename it over `wal1.log`.
    fn consolidate(dir: &Path, memtable: &MemTable, generation: u64) -> Result<()> {
        let tmp = dir.join(WAL_TMP_NAME);
        if tmp.exists() {
            fs::remove_file(&tmp)?;
        }
        {
            let mut writer =
                WALWriter::with_generation(&tmp, generation, SyncPolicy::EveryNWrites(usize::MAX))?;
            for record in memtable.entries() {
                writer.append(&record)?;
            }
            writer.sync()?;
        }
        fs::rename(&tmp, dir.join(WAL_FILE_NAMES[0]))?;
        info!(records = memtable.len(), generation, "consolidated both WAL files into wal1.log");
        Ok(())
    }

    /// Append to the active log.
    pub fn append(&mut self, record: &Record) -> Result<()> {
        self.logs[self.active].append(record)
    }

    pub fn active_writer(&mut self) -> &mut WALWriter {
        &mut self.logs[self.active]
    }

    pub fn active_path(&self) -> &Path {
        self.logs[self.active].path()
    }

    /// Index (0 or 1) of the active log.
    pub fn active_id(&self) -> usize {
        self.active
    }

    /// Make the idle log active. Returns the id of the vacated log, which
    /// still holds the frozen memtable's records until `reset` is called.
    pub fn switch(&mut self) -> Result<usize> {
        let vacated = self.active;
        self.logs[vacated].sync()?;
        self.active = 1 - vacated;
        debug!(
            active = %self.logs[self.active].path().display(),
            "switched active WAL"
        );
        Ok(vacated)
    }

    /// Delete and recreate a vacated log under the next generation. Its
    /// records must already be durable in an SSTable.
    pub fn reset(&mut self, id: usize) -> Result<()> {
        debug_assert_ne!(id, self.active, "resetting the active WAL");
        let generation = self.next_generation;
        self.next_generation += 1;
        self.logs[id].reset(generation)
    }

    /// Force fsync of the active log.
    pub fn sync(&mut self) -> Result<()> {
        self.logs[self.active].sync()
    }
}
