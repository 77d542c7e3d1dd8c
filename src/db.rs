use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{select, Receiver, Sender};
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, error, info, trace};

use crate::compaction::{run_compaction, CompactionPolicy};
use crate::error::{Error, Result};
use crate::levels::{LevelManager, NUM_LEVELS};
use crate::memtable::MemTableManager;
use crate::options::Options;
use crate::types::{Lookup, Record, Value};
use crate::wal::WALManager;

/// Handle to an open storage engine.
///
/// Writes: WAL append, then memtable. Reads: active memtable → immutable
/// memtable → SSTables level by level. A background thread periodically
/// flushes the memtable and compacts levels; see [`DB::maintain`].
///
/// Every handle is independent; open two directories, get two engines.
pub struct DB {
    inner: Arc<DbInner>,
    shutdown: Sender<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct DbInner {
    options: Options,
    policy: CompactionPolicy,
    memtables: MemTableManager,
    /// Also serializes writers, so per-key WAL order equals memtable order.
    wal: Mutex<WALManager>,
    levels: LevelManager,
    /// Only one flush/compaction cycle at a time.
    maintenance: Mutex<()>,
    /// Set by the first failed maintenance cycle or WAL append; writes are
    /// refused after.
    background_error: Mutex<Option<String>>,
    flushes: AtomicU64,
    compactions: AtomicU64,
}

/// Point-in-time engine counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    /// Records (tombstones included) in the active memtable.
    pub active_entries: usize,
    /// Records in the memtable being flushed, if any.
    pub immutable_entries: Option<usize>,
    /// SSTable count per level.
    pub level_segments: Vec<usize>,
    /// File bytes per level.
    pub level_bytes: Vec<u64>,
    /// Memtable flushes completed since open.
    pub flushes: u64,
    /// Level compactions completed since open.
    pub compactions: u64,
}

impl DB {
    /// Open (or create) the engine in `options.data_dir`.
    ///
    /// 1. Create the data directory if missing
    /// 2. Replay the WAL files into the active memtable
    /// 3. Load every `{level}.{index}.db` table
    /// 4. Run one compaction check
    /// 5. Start the maintenance thread (unless disabled)
    pub fn open(options: Options) -> Result<Self> {
        options.validate()?;
        let dir = options.data_dir.clone();
        fs::create_dir_all(&dir)?;

        info!(dir = %dir.display(), "opening database");
        let (wal, memtable) = WALManager::open(&dir, options.sync_policy)?;
        let levels = LevelManager::load(&dir, options.bloom_false_positive_rate)?;

        let inner = Arc::new(DbInner {
            policy: CompactionPolicy::from_options(&options),
            memtables: MemTableManager::with_active(memtable),
            wal: Mutex::new(wal),
            levels,
            maintenance: Mutex::new(()),
            background_error: Mutex::new(None),
            flushes: AtomicU64::new(0),
            compactions: AtomicU64::new(0),
            options,
        });

        inner.guarded(|inner| inner.compact())?;

        let (shutdown, shutdown_rx) = crossbeam_channel::bounded(1);
        let worker = if inner.options.background_maintenance {
            Some(spawn_maintenance(Arc::clone(&inner), shutdown_rx)?)
        } else {
            None
        };

        info!(
            dir = %dir.display(),
            memtable_entries = inner.memtables.active().len(),
            "database open"
        );
        Ok(DB {
            inner,
            shutdown,
            worker: Mutex::new(worker),
        })
    }

    /// Insert or overwrite a key. Returns once the WAL record is written
    /// (and fsync'd under `SyncPolicy::EveryWrite`).
    pub fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        trace!(key, len = value.len(), "put");
        self.inner.put(Record::put(key, value))
    }

    /// Delete a key, returning the live value it had before, if any.
    ///
    /// A tombstone is written whether or not the key existed anywhere.
    pub fn delete(&self, key: &str) -> Result<Option<Value>> {
        trace!(key, "delete");
        self.inner.delete(key)
    }

    /// Read a key. Deleted and never-written keys both return `None`.
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        trace!(key, "get");
        Ok(self.inner.lookup(key)?.into_value())
    }

    /// Run one maintenance cycle on the calling thread: flush the memtable
    /// if it holds more than `memtable_threshold` records, then compact any
    /// level over its limits.
    pub fn maintain(&self) -> Result<()> {
        self.inner.maintain()
    }

    /// Flush the active memtable now, regardless of the threshold.
    /// Returns false if it was empty.
    pub fn flush(&self) -> Result<bool> {
        self.inner.guarded(|inner| inner.flush())
    }

    pub fn stats(&self) -> Stats {
        let inner = &self.inner;
        Stats {
            active_entries: inner.memtables.active().len(),
            immutable_entries: inner.memtables.immutable().map(|mt| mt.len()),
            level_segments: (0..NUM_LEVELS).map(|l| inner.levels.segment_count(l)).collect(),
            level_bytes: (0..NUM_LEVELS).map(|l| inner.levels.level_size(l)).collect(),
            flushes: inner.flushes.load(Ordering::Relaxed),
            compactions: inner.compactions.load(Ordering::Relaxed),
        }
    }

    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    /// Stop the maintenance thread and sync the active WAL.
    pub fn close(self) -> Result<()> {
        self.stop_worker()?;
        self.inner.wal.lock().sync()?;
        info!(dir = %self.inner.options.data_dir.display(), "database closed");
        Ok(())
    }

    fn stop_worker(&self) -> Result<()> {
        let Some(handle) = self.worker.lock().take() else {
            return Ok(());
        };
        // A full channel means a stop is already pending.
        self.shutdown.try_send(()).ok();
        handle
            .join()
            .map_err(|_| Error::Background("maintenance thread panicked".into()))
    }
}

impl Drop for DB {
    fn drop(&mut self) {
        if let Err(e) = self.stop_worker() {
            error!(error = %e, "stopping maintenance thread");
        }
    }
}

fn spawn_maintenance(inner: Arc<DbInner>, shutdown: Receiver<()>) -> Result<JoinHandle<()>> {
    let interval = inner.options.maintenance_interval;
    let handle = std::thread::Builder::new()
        .name("lsmkv-maintenance".into())
        .spawn(move || {
            let ticker = crossbeam_channel::tick(interval);
            loop {
                select! {
                    recv(shutdown) -> _ => break,
                    recv(ticker) -> _ => {
                        if let Err(e) = inner.maintain() {
                            error!(error = %e, "maintenance cycle failed; stopping");
                            break;
                        }
                    }
                }
            }
            debug!("maintenance thread exiting");
        })?;
    Ok(handle)
}

impl DbInner {
    fn check_background(&self) -> Result<()> {
        match &*self.background_error.lock() {
            Some(msg) => Err(Error::Background(msg.clone())),
            None => Ok(()),
        }
    }

    /// Record the first fatal error.
    fn poison(&self, e: &Error) {
        let mut slot = self.background_error.lock();
        if slot.is_none() {
            *slot = Some(e.to_string());
        }
    }

    /// Run `f` under the maintenance lock. Any failure is fatal: it is
    /// recorded so later writes and cycles are refused.
    fn guarded<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        self.check_background()?;
        let _cycle = self.maintenance.lock();
        f(self).inspect_err(|e| self.poison(e))
    }

    /// Memtables first, then levels.
    fn lookup(&self, key: &str) -> Result<Lookup> {
        match self.memtables.search(key) {
            Lookup::NotFound => self.levels.get(key),
            resolved => Ok(resolved),
        }
    }

    /// Take the WAL lock for a write. The poison check happens under the
    /// lock so no write follows a failed append.
    fn writer(&self) -> Result<MutexGuard<'_, WALManager>> {
        let wal = self.wal.lock();
        self.check_background()?;
        Ok(wal)
    }

    /// Log first, then memtable, both under the WAL lock. A failed append
    /// is fatal.
    fn write(&self, wal: &mut WALManager, record: Record) -> Result<()> {
        if let Err(e) = wal.append(&record) {
            error!(key = %record.key, error = %e, "WAL append failed; refusing further writes");
            self.poison(&e);
            return Err(e);
        }
        self.memtables.active().apply(record);
        Ok(())
    }

    fn put(&self, record: Record) -> Result<()> {
        let mut wal = self.writer()?;
        self.write(&mut wal, record)
    }

    /// The prior value is resolved before the tombstone goes in. Freezing
    /// needs the WAL lock, so the memtable pair cannot change underneath.
    fn delete(&self, key: &str) -> Result<Option<Value>> {
        let mut wal = self.writer()?;
        let prior = self.lookup(key)?;
        self.write(&mut wal, Record::tombstone(key))?;
        Ok(prior.into_value())
    }

    fn maintain(&self) -> Result<()> {
        self.guarded(|inner| {
            let active = inner.memtables.active().len();
            if active > inner.options.memtable_threshold {
                inner.flush()?;
            } else {
                debug!(active, threshold = inner.options.memtable_threshold, "no flush needed");
            }
            inner.compact()
        })
    }

    /// Freeze the active memtable and write it out as a level-0 table.
    ///
    /// Writers only wait for the swap itself; the SSTable is built with no
    /// lock held. Caller holds the maintenance lock.
    fn flush(&self) -> Result<bool> {
        if self.memtables.active().is_empty() {
            return Ok(false);
        }

        let (frozen, vacated) = {
            let mut wal = self.wal.lock();
            let vacated = wal.switch()?;
            let Some(frozen) = self.memtables.freeze() else {
                return Err(Error::Background(
                    "immutable memtable still present at freeze".into(),
                ));
            };
            (frozen, vacated)
        };

        let records = frozen.entries();
        let table = self.levels.create_table(0, &records)?;
        self.memtables.clear_immutable();
        self.wal.lock().reset(vacated)?;

        self.flushes.fetch_add(1, Ordering::Relaxed);
        info!(
            level = 0,
            index = table.index,
            records = records.len(),
            bytes = table.table.file_size(),
            "flushed memtable"
        );
        Ok(true)
    }

    fn compact(&self) -> Result<()> {
        let outcomes = run_compaction(&self.levels, &self.policy)?;
        self.compactions
            .fetch_add(outcomes.len() as u64, Ordering::Relaxed);
        Ok(())
    }
}
