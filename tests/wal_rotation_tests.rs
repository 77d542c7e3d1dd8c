// WAL manager tests
// Two alternating logs: switch on freeze, reset after flush, recovery on open.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use lsmkv::wal::{encode_header, WALManager, WALReader, WALWriter};
use lsmkv::{Lookup, Record, SyncPolicy};

fn read_keys(path: &Path) -> Vec<String> {
    WALReader::new(path)
        .unwrap()
        .iter()
        .map(|r| r.unwrap().key)
        .collect()
}

fn write_log(path: &Path, generation: u64, records: &[Record]) {
    let mut writer = WALWriter::with_generation(path, generation, SyncPolicy::EveryWrite).unwrap();
    for record in records {
        writer.append(record).unwrap();
    }
}

fn generation_of(path: &Path) -> Option<u64> {
    WALReader::new(path).unwrap().generation().unwrap()
}

// =============================================================================
// Test 1: Fresh directory → both logs created, wal1 active, nothing replayed
// =============================================================================
#[test]
fn open_fresh_directory() {
    let dir = tempfile::tempdir().unwrap();
    let (manager, memtable) = WALManager::open(dir.path(), SyncPolicy::EveryWrite).unwrap();

    assert!(memtable.is_empty());
    assert_eq!(manager.active_id(), 0);
    assert_eq!(manager.active_path(), dir.path().join("wal1.log"));
    assert!(dir.path().join("wal1.log").exists());
    assert!(dir.path().join("wal2.log").exists());
}

// =============================================================================
// Test 2: Switch → new writes go to the other log; old log keeps its records
// =============================================================================
#[test]
fn writes_go_to_other_log_after_switch() {
    let dir = tempfile::tempdir().unwrap();
    let (mut manager, _) = WALManager::open(dir.path(), SyncPolicy::EveryWrite).unwrap();

    manager.append(&Record::put("before", b"switch".to_vec())).unwrap();
    let vacated = manager.switch().unwrap();
    manager.append(&Record::put("after", b"switch".to_vec())).unwrap();

    assert_eq!(vacated, 0);
    assert_eq!(manager.active_id(), 1);
    assert_eq!(read_keys(&dir.path().join("wal1.log")), vec!["before"]);
    assert_eq!(read_keys(&dir.path().join("wal2.log")), vec!["after"]);
}

// =============================================================================
// Test 3: Reset empties the vacated log only
// =============================================================================
#[test]
fn reset_clears_vacated_log() {
    let dir = tempfile::tempdir().unwrap();
    let (mut manager, _) = WALManager::open(dir.path(), SyncPolicy::EveryWrite).unwrap();

    manager.append(&Record::put("flushed", b"1".to_vec())).unwrap();
    let vacated = manager.switch().unwrap();
    manager.append(&Record::put("live", b"2".to_vec())).unwrap();
    manager.reset(vacated).unwrap();

    assert_eq!(std::fs::metadata(dir.path().join("wal1.log")).unwrap().len(), 0);
    assert_eq!(read_keys(&dir.path().join("wal2.log")), vec!["live"]);
}

// =============================================================================
// Test 4: Switching twice returns to the first log
// =============================================================================
#[test]
fn switch_alternates() {
    let dir = tempfile::tempdir().unwrap();
    let (mut manager, _) = WALManager::open(dir.path(), SyncPolicy::EveryWrite).unwrap();

    assert_eq!(manager.switch().unwrap(), 0);
    manager.reset(0).unwrap();
    assert_eq!(manager.switch().unwrap(), 1);
    manager.reset(1).unwrap();
    assert_eq!(manager.active_id(), 0);
}

// =============================================================================
// Test 5: Reopen after switch+reset → replays only the live log
// =============================================================================
#[test]
fn reopen_replays_active_log() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (mut manager, _) = WALManager::open(dir.path(), SyncPolicy::EveryWrite).unwrap();
        manager.append(&Record::put("flushed", b"1".to_vec())).unwrap();
        let vacated = manager.switch().unwrap();
        manager.append(&Record::put("live", b"2".to_vec())).unwrap();
        manager.reset(vacated).unwrap();
    }

    let (manager, memtable) = WALManager::open(dir.path(), SyncPolicy::EveryWrite).unwrap();
    assert_eq!(manager.active_id(), 1);
    assert_eq!(memtable.len(), 1);
    assert_eq!(memtable.search("live"), Lookup::Found(b"2".to_vec()));
    assert_eq!(memtable.search("flushed"), Lookup::NotFound);
}

// =============================================================================
// Test 6: Both logs non-empty → lower generation replayed first, merged into wal1
// =============================================================================
// Happens after a crash between switch and reset.
#[test]
fn both_logs_merged_by_generation() {
    let dir = tempfile::tempdir().unwrap();
    // wal2 carries the lower generation, so its values must lose.
    write_log(
        &dir.path().join("wal2.log"),
        4,
        &[Record::put("a", b"old".to_vec()), Record::put("b", b"old".to_vec())],
    );
    write_log(
        &dir.path().join("wal1.log"),
        5,
        &[Record::put("a", b"new".to_vec()), Record::tombstone("b")],
    );

    let (manager, memtable) = WALManager::open(dir.path(), SyncPolicy::EveryWrite).unwrap();

    assert_eq!(memtable.search("a"), Lookup::Found(b"new".to_vec()));
    assert_eq!(memtable.search("b"), Lookup::Deleted);
    assert_eq!(manager.active_id(), 0);
    assert_eq!(std::fs::metadata(dir.path().join("wal2.log")).unwrap().len(), 0);
    assert!(!dir.path().join("wal.tmp").exists());
    assert!(generation_of(&dir.path().join("wal1.log")).unwrap() > 5);

    // The consolidated wal1 alone reproduces the same state.
    drop(manager);
    let (_, again) = WALManager::open(dir.path(), SyncPolicy::EveryWrite).unwrap();
    assert_eq!(again.entries(), memtable.entries());
}

// =============================================================================
// Test 7: Torn tail is truncated on open
// =============================================================================
#[test]
fn torn_tail_truncated_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wal1.log");
    {
        let mut writer = WALWriter::new(&path, SyncPolicy::EveryWrite).unwrap();
        writer.append(&Record::put("kept", b"1".to_vec())).unwrap();
    }
    let valid_len = std::fs::metadata(&path).unwrap().len();
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0x40, 0, 0, 0, 0, 0, 0, 0, 0x01, 0x02]).unwrap();
    }

    let (mut manager, memtable) = WALManager::open(dir.path(), SyncPolicy::EveryWrite).unwrap();
    assert_eq!(memtable.len(), 1);
    assert_eq!(std::fs::metadata(&path).unwrap().len(), valid_len);

    // New appends land after the valid prefix, not after the garbage.
    manager.append(&Record::put("next", b"2".to_vec())).unwrap();
    assert_eq!(read_keys(&path), vec!["kept", "next"]);
}

// =============================================================================
// Test 8: Complete but undecodable frame fails open
// =============================================================================
#[test]
fn corrupt_frame_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    let mut file = File::create(dir.path().join("wal1.log")).unwrap();
    file.write_all(&encode_header(1)).unwrap();
    // 6-byte payload with an invalid type byte.
    file.write_all(&6u64.to_le_bytes()).unwrap();
    file.write_all(&[0x09, 1, 0, 0, 0, b'k']).unwrap();
    drop(file);

    assert!(WALManager::open(dir.path(), SyncPolicy::EveryWrite).is_err());
}

// =============================================================================
// Test 9: Crash between switch and reset after wal1 became active again
// =============================================================================
// Second rotation: wal1 holds the newer writes. Both files are written within
// the same instant, so only the generation can order them.
#[test]
fn crash_after_second_switch_keeps_newest_write() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (mut manager, _) = WALManager::open(dir.path(), SyncPolicy::EveryWrite).unwrap();
        manager.append(&Record::put("x", b"1".to_vec())).unwrap();
        let vacated = manager.switch().unwrap();
        manager.reset(vacated).unwrap();

        manager.append(&Record::put("a", b"old".to_vec())).unwrap();
        assert_eq!(manager.switch().unwrap(), 1);
        manager.append(&Record::put("a", b"new".to_vec())).unwrap();
        // No reset: the process dies here.
    }

    let wal1 = generation_of(&dir.path().join("wal1.log")).unwrap();
    let wal2 = generation_of(&dir.path().join("wal2.log")).unwrap();
    assert!(wal1 > wal2);

    let (manager, memtable) = WALManager::open(dir.path(), SyncPolicy::EveryWrite).unwrap();
    assert_eq!(memtable.search("a"), Lookup::Found(b"new".to_vec()));
    assert_eq!(memtable.search("x"), Lookup::NotFound);
    assert_eq!(manager.active_id(), 0);
}

// =============================================================================
// Test 10: Each reset hands out a higher generation than the active log's
// =============================================================================
#[test]
fn idle_log_always_newer_than_active() {
    let dir = tempfile::tempdir().unwrap();
    let (mut manager, _) = WALManager::open(dir.path(), SyncPolicy::EveryWrite).unwrap();
    let logs = [dir.path().join("wal1.log"), dir.path().join("wal2.log")];

    for round in 0..4 {
        manager.append(&Record::put(format!("r{round}"), b"v".to_vec())).unwrap();
        let vacated = manager.switch().unwrap();
        manager.append(&Record::put(format!("s{round}"), b"v".to_vec())).unwrap();
        assert!(
            generation_of(&logs[manager.active_id()]) > generation_of(&logs[vacated]),
            "round {round}"
        );
        manager.reset(vacated).unwrap();
    }
}

// =============================================================================
// Test 11: Both logs with the same generation cannot be ordered → open fails
// =============================================================================
#[test]
fn equal_generations_fail_open() {
    let dir = tempfile::tempdir().unwrap();
    write_log(&dir.path().join("wal1.log"), 3, &[Record::put("a", b"1".to_vec())]);
    write_log(&dir.path().join("wal2.log"), 3, &[Record::put("a", b"2".to_vec())]);

    assert!(WALManager::open(dir.path(), SyncPolicy::EveryWrite).is_err());
}
