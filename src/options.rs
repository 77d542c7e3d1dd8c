use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::wal::SyncPolicy;

/// Startup configuration for a [`crate::DB`].
///
/// Read once by `DB::open` and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Options {
    /// Directory holding the WAL files and every `{level}.{index}.db` table.
    /// Created on open if missing.
    pub data_dir: PathBuf,

    /// Byte ceiling of level 0. Level n may hold `level0_max_bytes * 10^n`.
    /// Default: 1 MB
    pub level0_max_bytes: u64,

    /// A level holding more SSTables than this is compacted.
    /// Default: 10
    pub level_max_segments: usize,

    /// The active memtable is flushed once it holds more records than this
    /// (tombstones included).
    /// Default: 1000
    pub memtable_threshold: usize,

    /// Period of the background flush/compaction cycle.
    /// Default: 1 second
    pub maintenance_interval: Duration,

    /// When WAL appends are fsync'd.
    /// Default: EveryWrite
    pub sync_policy: SyncPolicy,

    /// Target false positive rate of the per-SSTable bloom filter.
    /// Default: 0.01
    pub bloom_false_positive_rate: f64,

    /// Spawn the background maintenance thread. When false, the owner drives
    /// flushes and compactions through `DB::maintain`.
    /// Default: true
    pub background_maintenance: bool,
}

impl Options {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            level0_max_bytes: 1024 * 1024,
            level_max_segments: 10,
            memtable_threshold: 1000,
            maintenance_interval: Duration::from_secs(1),
            sync_policy: SyncPolicy::EveryWrite,
            bloom_false_positive_rate: 0.01,
            background_maintenance: true,
        }
    }

    /// Builder-style: set the level-0 byte ceiling.
    pub fn with_level0_max_bytes(mut self, bytes: u64) -> Self {
        self.level0_max_bytes = bytes;
        self
    }

    /// Builder-style: set the per-level SSTable count ceiling.
    pub fn with_level_max_segments(mut self, count: usize) -> Self {
        self.level_max_segments = count;
        self
    }

    /// Builder-style: set the memtable record-count flush threshold.
    pub fn with_memtable_threshold(mut self, records: usize) -> Self {
        self.memtable_threshold = records;
        self
    }

    /// Builder-style: set the maintenance interval.
    pub fn with_maintenance_interval(mut self, interval: Duration) -> Self {
        self.maintenance_interval = interval;
        self
    }

    /// Builder-style: set the WAL sync policy.
    pub fn with_sync_policy(mut self, policy: SyncPolicy) -> Self {
        self.sync_policy = policy;
        self
    }

    /// Builder-style: set the bloom filter false positive rate.
    pub fn with_bloom_false_positive_rate(mut self, rate: f64) -> Self {
        self.bloom_false_positive_rate = rate;
        self
    }

    /// Builder-style: enable/disable the background maintenance thread.
    pub fn with_background_maintenance(mut self, enabled: bool) -> Self {
        self.background_maintenance = enabled;
        self
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.level0_max_bytes == 0 {
            return Err(Error::Config("level0_max_bytes must be > 0".into()));
        }
        if self.level_max_segments == 0 {
            return Err(Error::Config("level_max_segments must be > 0".into()));
        }
        if self.memtable_threshold == 0 {
            return Err(Error::Config("memtable_threshold must be > 0".into()));
        }
        if self.maintenance_interval.is_zero() {
            return Err(Error::Config("maintenance_interval must be > 0".into()));
        }
        if let SyncPolicy::EveryNWrites(0) = self.sync_policy {
            return Err(Error::Config("EveryNWrites needs n > 0".into()));
        }
        let fpr = self.bloom_false_positive_rate;
        if !(fpr > 0.0 && fpr < 1.0) {
            return Err(Error::Config(format!(
                "bloom_false_positive_rate must be in (0, 1), got {fpr}"
            )));
        }
        if self.data_dir.exists() && !self.data_dir.is_dir() {
            return Err(Error::Config(format!(
                "{} exists and is not a directory",
                self.data_dir.display()
            )));
        }
        Ok(())
    }
}
