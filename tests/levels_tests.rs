// Level manager tests
// Per-level table chains, naming, lookup order, and loading from disk.

use std::fs;
use std::sync::Arc;

use lsmkv::levels::{parse_table_file_name, table_file_name, LevelManager, NUM_LEVELS};
use lsmkv::sstable::{SSTable, SSTableBuilder};
use lsmkv::{Lookup, Record};
use tempfile::tempdir;

const FPR: f64 = 0.01;

fn put(key: &str, value: &str) -> Record {
    Record::put(key, value.as_bytes().to_vec())
}

// =============================================================================
// Test 1: File names are {level}.{index}.db
// =============================================================================
#[test]
fn table_file_names() {
    assert_eq!(table_file_name(0, 0), "0.0.db");
    assert_eq!(table_file_name(3, 17), "3.17.db");

    assert_eq!(parse_table_file_name("0.0.db"), Some((0, 0)));
    assert_eq!(parse_table_file_name("9.123.db"), Some((9, 123)));
    assert_eq!(parse_table_file_name("10.0.db"), None);
    assert_eq!(parse_table_file_name("0.0.db.tmp"), None);
    assert_eq!(parse_table_file_name("a.b.db"), None);
    assert_eq!(parse_table_file_name("wal1.log"), None);
}

// =============================================================================
// Test 2: create_table appends with increasing indexes
// =============================================================================
#[test]
fn create_table_appends_to_tail() {
    let dir = tempdir().unwrap();
    let levels = LevelManager::new(dir.path(), FPR);

    let first = levels.create_table(0, &[put("a", "1")]).unwrap();
    let second = levels.create_table(0, &[put("b", "1")]).unwrap();

    assert_eq!((first.index, second.index), (0, 1));
    assert_eq!(levels.segment_count(0), 2);
    assert!(dir.path().join("0.0.db").exists());
    assert!(dir.path().join("0.1.db").exists());
    assert!(!dir.path().join("0.1.db.tmp").exists());
    assert_eq!(
        levels.level_size(0),
        first.table.file_size() + second.table.file_size()
    );
}

// =============================================================================
// Test 3: Within a level, the newest table wins
// =============================================================================
#[test]
fn newest_table_in_level_wins() {
    let dir = tempdir().unwrap();
    let levels = LevelManager::new(dir.path(), FPR);

    levels.create_table(0, &[put("k", "old"), put("only_old", "x")]).unwrap();
    levels.create_table(0, &[put("k", "new")]).unwrap();

    assert_eq!(levels.get("k").unwrap(), Lookup::Found(b"new".to_vec()));
    assert_eq!(levels.get("only_old").unwrap(), Lookup::Found(b"x".to_vec()));
    assert_eq!(levels.get("absent").unwrap(), Lookup::NotFound);
}

// =============================================================================
// Test 4: Lower level shadows deeper level, tombstones included
// =============================================================================
#[test]
fn shallower_level_shadows_deeper() {
    let dir = tempdir().unwrap();
    let levels = LevelManager::new(dir.path(), FPR);

    levels.create_table(2, &[put("k", "deep"), put("d", "deep")]).unwrap();
    levels.create_table(1, &[put("k", "mid")]).unwrap();
    levels.create_table(0, &[Record::tombstone("d")]).unwrap();

    assert_eq!(levels.get("k").unwrap(), Lookup::Found(b"mid".to_vec()));
    assert_eq!(levels.get("d").unwrap(), Lookup::Deleted);
}

// =============================================================================
// Test 5: insert rejects an index that is not the newest
// =============================================================================
#[test]
fn insert_requires_increasing_index() {
    let dir = tempdir().unwrap();
    let levels = LevelManager::new(dir.path(), FPR);
    let handle = levels.create_table(0, &[put("a", "1")]).unwrap();

    let path = dir.path().join("0.5.db");
    SSTableBuilder::build(&path, &[put("b", "1")]).unwrap();
    let table = Arc::new(SSTable::open(&path, FPR).unwrap());

    assert!(!levels.insert(0, handle.index, Arc::clone(&table)));
    assert!(levels.insert(0, 5, table));
    assert_eq!(levels.reserve_index(0), 6);
}

// =============================================================================
// Test 6: remove takes tables out of the chain
// =============================================================================
#[test]
fn remove_returns_present_tables() {
    let dir = tempdir().unwrap();
    let levels = LevelManager::new(dir.path(), FPR);
    for i in 0..3 {
        levels.create_table(1, &[put(&format!("k{i}"), "v")]).unwrap();
    }

    let removed = levels.remove(1, &[0, 2, 7]);

    let removed_indexes: Vec<u64> = removed.iter().map(|h| h.index).collect();
    assert_eq!(removed_indexes, vec![0, 2]);
    let remaining: Vec<u64> = levels.tables(1).iter().map(|h| h.index).collect();
    assert_eq!(remaining, vec![1]);
    // Indexes are never reused.
    assert_eq!(levels.create_table(1, &[put("x", "y")]).unwrap().index, 3);
}

// =============================================================================
// Test 7: load threads files by level and index, cleans up leftovers
// =============================================================================
#[test]
fn load_rebuilds_chains() {
    let dir = tempdir().unwrap();
    {
        let levels = LevelManager::new(dir.path(), FPR);
        levels.create_table(0, &[put("k", "v0")]).unwrap();
        levels.create_table(0, &[put("k", "v1")]).unwrap();
        levels.create_table(0, &[put("k", "v2")]).unwrap();
        levels.create_table(4, &[put("deep", "d")]).unwrap();
        levels.remove(0, &[1]);
        fs::remove_file(dir.path().join("0.1.db")).unwrap();
    }
    fs::write(dir.path().join("0.9.db.tmp"), b"half written").unwrap();
    fs::write(dir.path().join("notes.txt"), b"not a table").unwrap();
    fs::write(dir.path().join("wal1.log"), b"").unwrap();

    let levels = LevelManager::load(dir.path(), FPR).unwrap();

    let level0: Vec<u64> = levels.tables(0).iter().map(|h| h.index).collect();
    assert_eq!(level0, vec![0, 2]);
    assert_eq!(levels.segment_count(4), 1);
    assert_eq!(levels.get("k").unwrap(), Lookup::Found(b"v2".to_vec()));
    assert_eq!(levels.get("deep").unwrap(), Lookup::Found(b"d".to_vec()));
    assert!(!dir.path().join("0.9.db.tmp").exists());
    assert!(dir.path().join("notes.txt").exists());
    assert_eq!(levels.reserve_index(0), 3);
}

// =============================================================================
// Test 8: Empty directory → every level empty
// =============================================================================
#[test]
fn load_empty_directory() {
    let dir = tempdir().unwrap();
    let levels = LevelManager::load(dir.path(), FPR).unwrap();

    for level in 0..NUM_LEVELS {
        assert_eq!(levels.segment_count(level), 0);
        assert_eq!(levels.level_size(level), 0);
    }
    assert_eq!(levels.get("k").unwrap(), Lookup::NotFound);
}

// =============================================================================
// Test 9: Non-canonical spellings of a table name are not tables
// =============================================================================
// `0.01.db` would otherwise alias `0.1.db` and share its slot in the chain.
#[test]
fn non_canonical_names_ignored() {
    assert_eq!(parse_table_file_name("0.01.db"), None);
    assert_eq!(parse_table_file_name("+0.1.db"), None);
    assert_eq!(parse_table_file_name("0.+1.db"), None);
    assert_eq!(parse_table_file_name("00.1.db"), None);
    assert_eq!(parse_table_file_name("0.1.db"), Some((0, 1)));

    let dir = tempdir().unwrap();
    {
        let levels = LevelManager::new(dir.path(), FPR);
        levels.create_table(0, &[put("k", "v0")]).unwrap();
        levels.create_table(0, &[put("k", "v1")]).unwrap();
    }
    fs::copy(dir.path().join("0.0.db"), dir.path().join("0.01.db")).unwrap();
    fs::copy(dir.path().join("0.0.db"), dir.path().join("+0.1.db")).unwrap();

    let levels = LevelManager::load(dir.path(), FPR).unwrap();

    let level0: Vec<u64> = levels.tables(0).iter().map(|h| h.index).collect();
    assert_eq!(level0, vec![0, 1]);
    assert_eq!(levels.get("k").unwrap(), Lookup::Found(b"v1".to_vec()));
}
