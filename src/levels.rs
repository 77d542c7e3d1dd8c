use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::sstable::{SSTable, SSTableBuilder};
use crate::types::{Lookup, Record};

/// Number of levels, 0 (freshest) through 9 (deepest).
pub const NUM_LEVELS: usize = 10;

const TABLE_EXT: &str = "db";
const TMP_SUFFIX: &str = ".tmp";

/// `{level}.{index}.db`
pub fn table_file_name(level: usize, index: u64) -> String {
    format!("{level}.{index}.{TABLE_EXT}")
}

/// Parse `{level}.{index}.db`. Anything else (including out-of-range levels)
/// is not a table file. Only the canonical spelling counts, so `0.01.db` or
/// `+0.1.db` never alias `0.1.db`.
pub fn parse_table_file_name(name: &str) -> Option<(usize, u64)> {
    let stem = name.strip_suffix(".db")?;
    let (level, index) = stem.split_once('.')?;
    let level: usize = level.parse().ok()?;
    let index: u64 = index.parse().ok()?;
    (level < NUM_LEVELS && table_file_name(level, index) == name).then_some((level, index))
}

/// One SSTable in a level chain, tagged with its per-level sequence index.
#[derive(Debug, Clone)]
pub struct TableHandle {
    pub index: u64,
    pub table: Arc<SSTable>,
}

#[derive(Debug, Default)]
struct Level {
    /// Ascending by `index`; the last element is the newest table.
    tables: Vec<TableHandle>,
    /// Next index to hand out. Never reused, even after the level is cleared.
    next_index: u64,
}

impl Level {
    fn size_bytes(&self) -> u64 {
        self.tables.iter().map(|h| h.table.file_size()).sum()
    }
}

/// Owns every SSTable, organized as one append-ordered chain per level.
///
/// Lookup order: level 0 before level 1 and so on; within a level, newest
/// table (highest index) first. The first table with an answer wins, so a
/// tombstone in a newer table shadows values in older ones.
pub struct LevelManager {
    dir: PathBuf,
    bloom_false_positive_rate: f64,
    levels: RwLock<Vec<Level>>,
}

impl LevelManager {
    /// An empty manager rooted at `dir`.
    pub fn new(dir: &Path, bloom_false_positive_rate: f64) -> Self {
        LevelManager {
            dir: dir.to_path_buf(),
            bloom_false_positive_rate,
            levels: RwLock::new((0..NUM_LEVELS).map(|_| Level::default()).collect()),
        }
    }

    /// Scan `dir` for `{level}.{index}.db` files and thread each into its
    /// level chain ordered by index. Unrecognized files are ignored; leftover
    /// temporary tables from an interrupted build are deleted.
    pub fn load(dir: &Path, bloom_false_positive_rate: f64) -> Result<Self> {
        let manager = LevelManager::new(dir, bloom_false_positive_rate);
        let mut loaded = 0usize;

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };

            if let Some(base) = name.strip_suffix(TMP_SUFFIX) {
                if parse_table_file_name(base).is_some() {
                    warn!(file = name, "removing unfinished table file");
                    fs::remove_file(entry.path())?;
                }
                continue;
            }

            let Some((level, index)) = parse_table_file_name(name) else {
                if entry.path().extension().is_some_and(|ext| ext == TABLE_EXT) {
                    warn!(file = name, "ignoring .db file with unrecognized name");
                }
                continue;
            };

            let table = SSTable::open(&entry.path(), bloom_false_positive_rate)?;
            manager.thread_in(level, index, Arc::new(table));
            loaded += 1;
        }

        info!(dir = %dir.display(), tables = loaded, "loaded SSTables");
        Ok(manager)
    }

    /// Place a loaded table at its sorted position; bump `next_index` past it.
    fn thread_in(&self, level: usize, index: u64, table: Arc<SSTable>) {
        let mut levels = self.levels.write();
        let lvl = &mut levels[level];
        let pos = lvl.tables.partition_point(|h| h.index < index);
        lvl.tables.insert(pos, TableHandle { index, table });
        lvl.next_index = lvl.next_index.max(index + 1);
    }

    /// Reserve the next sequence index of a level.
    pub fn reserve_index(&self, level: usize) -> u64 {
        let mut levels = self.levels.write();
        let index = levels[level].next_index;
        levels[level].next_index += 1;
        index
    }

    /// Append a table to the tail of a level chain.
    ///
    /// Returns `false` (and inserts nothing) unless `index` is strictly
    /// greater than every index already in the level.
    pub fn insert(&self, level: usize, index: u64, table: Arc<SSTable>) -> bool {
        let mut levels = self.levels.write();
        let lvl = &mut levels[level];
        if lvl.tables.last().is_some_and(|h| h.index >= index) {
            return false;
        }
        lvl.tables.push(TableHandle { index, table });
        lvl.next_index = lvl.next_index.max(index + 1);
        true
    }

    /// Write `records` as a new table at the tail of `level`.
    ///
    /// The file is built under a temporary name, fsync'd, then renamed into
    /// place, so a crash mid-build never leaves a truncated `.db` file.
    pub fn create_table<'a>(
        &self,
        level: usize,
        records: impl IntoIterator<Item = &'a Record>,
    ) -> Result<TableHandle> {
        let index = self.reserve_index(level);
        let path = self.table_path(level, index);
        let tmp = self.dir.join(format!("{}{TMP_SUFFIX}", table_file_name(level, index)));

        let summary = SSTableBuilder::build(&tmp, records)?;
        fs::rename(&tmp, &path)?;

        let table = Arc::new(SSTable::open(&path, self.bloom_false_positive_rate)?);
        debug!(
            level,
            index,
            entries = summary.entry_count,
            bytes = summary.file_size,
            "created SSTable"
        );

        // Maintenance is the only caller and is single-threaded, so the tail
        // cannot have moved past `index` since it was reserved.
        let inserted = self.insert(level, index, Arc::clone(&table));
        debug_assert!(inserted, "reserved index {index} was not the newest in level {level}");
        Ok(TableHandle { index, table })
    }

    /// Search every level, 0 upward, newest table first within a level.
    pub fn get(&self, key: &str) -> Result<Lookup> {
        let levels = self.levels.read();
        for level in levels.iter() {
            for handle in level.tables.iter().rev() {
                match handle.table.get(key)? {
                    Lookup::NotFound => continue,
                    resolved => return Ok(resolved),
                }
            }
        }
        Ok(Lookup::NotFound)
    }

    /// Total file bytes of a level.
    pub fn level_size(&self, level: usize) -> u64 {
        self.levels.read()[level].size_bytes()
    }

    /// Number of tables in a level.
    pub fn segment_count(&self, level: usize) -> usize {
        self.levels.read()[level].tables.len()
    }

    /// Snapshot of a level chain, oldest first.
    pub fn tables(&self, level: usize) -> Vec<TableHandle> {
        self.levels.read()[level].tables.clone()
    }

    /// Remove the given tables from a level chain, returning the ones that
    /// were actually present. The caller deletes their files.
    pub fn remove(&self, level: usize, indexes: &[u64]) -> Vec<TableHandle> {
        let mut levels = self.levels.write();
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut levels[level].tables)
            .into_iter()
            .partition(|h| indexes.contains(&h.index));
        levels[level].tables = kept;
        removed
    }

    pub fn table_path(&self, level: usize, index: u64) -> PathBuf {
        self.dir.join(table_file_name(level, index))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
