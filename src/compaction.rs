use std::fs;
use std::time::Instant;

use tracing::{debug, info};

use crate::error::Result;
use crate::levels::{LevelManager, NUM_LEVELS};
use crate::memtable::MemTable;
use crate::options::Options;

/// When a level must be merged down.
///
/// A level is compacted when it holds more than `max_segments` tables or
/// more bytes than its ceiling. Ceilings grow 10× per level:
/// level n may hold `level0_max_bytes * 10^n`.
#[derive(Debug, Clone, Copy)]
pub struct CompactionPolicy {
    pub level0_max_bytes: u64,
    pub max_segments: usize,
}

impl CompactionPolicy {
    pub fn from_options(options: &Options) -> Self {
        CompactionPolicy {
            level0_max_bytes: options.level0_max_bytes,
            max_segments: options.level_max_segments,
        }
    }

    /// Byte ceiling of a level.
    pub fn level_ceiling(&self, level: usize) -> u64 {
        (0..level).fold(self.level0_max_bytes, |acc, _| acc.saturating_mul(10))
    }

    pub fn needs_compaction(&self, levels: &LevelManager, level: usize) -> bool {
        let count = levels.segment_count(level);
        // Rewriting a lone table at the deepest level cannot move data anywhere.
        if level == NUM_LEVELS - 1 && count <= 1 {
            return false;
        }
        count > self.max_segments || levels.level_size(level) > self.level_ceiling(level)
    }
}

/// What one level merge did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionOutcome {
    pub level: usize,
    pub target_level: usize,
    pub inputs: usize,
    /// Index of the table written at `target_level`; `None` when everything
    /// merged away (only tombstones at the deepest level).
    pub output_index: Option<u64>,
    pub output_entries: usize,
}

/// Merge every table of `level` into one table.
///
/// Tables are replayed oldest first into a scratch memtable, so a newer
/// record (value or tombstone) for a key replaces an older one. The result
/// lands at `level + 1`, except at the deepest level, which is rewritten in
/// place and drops its tombstones since nothing older exists below it.
///
/// The old files are deleted only after the new table is durable. A crash
/// between the two leaves both on disk; the duplicates resolve to the same
/// answers, so a restart tolerates it.
pub fn compact_level(levels: &LevelManager, level: usize) -> Result<Option<CompactionOutcome>> {
    let inputs = levels.tables(level);
    if inputs.is_empty() {
        return Ok(None);
    }

    let start = Instant::now();
    let deepest = level == NUM_LEVELS - 1;
    let target_level = if deepest { level } else { level + 1 };
    info!(level, target_level, inputs = inputs.len(), "compacting level");

    let merged = MemTable::new();
    for handle in &inputs {
        for record in handle.table.records()? {
            merged.apply(record);
        }
    }

    let mut records = merged.entries();
    if deepest {
        records.retain(|r| !r.is_tombstone());
    }

    let output = if records.is_empty() {
        None
    } else {
        Some(levels.create_table(target_level, &records)?)
    };

    let input_indexes: Vec<u64> = inputs.iter().map(|h| h.index).collect();
    let input_count = inputs.len();
    drop(inputs);
    for handle in levels.remove(level, &input_indexes) {
        let path = handle.table.path().to_path_buf();
        drop(handle);
        fs::remove_file(&path)?;
        debug!(path = %path.display(), "deleted compacted SSTable");
    }

    let outcome = CompactionOutcome {
        level,
        target_level,
        inputs: input_count,
        output_index: output.as_ref().map(|h| h.index),
        output_entries: records.len(),
    };
    info!(
        level,
        target_level,
        output_index = ?outcome.output_index,
        entries = outcome.output_entries,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "completed compaction"
    );
    Ok(Some(outcome))
}

/// Check every level in order, compacting the ones over their limits.
/// A merge into level n+1 is seen by the check of level n+1 in the same pass.
pub fn run_compaction(
    levels: &LevelManager,
    policy: &CompactionPolicy,
) -> Result<Vec<CompactionOutcome>> {
    let mut outcomes = Vec::new();
    for level in 0..NUM_LEVELS {
        if policy.needs_compaction(levels, level) {
            if let Some(outcome) = compact_level(levels, level)? {
                outcomes.push(outcome);
            }
        }
    }
    Ok(outcomes)
}
