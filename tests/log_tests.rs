//! Tests for PartitionedLog
//!
//! These tests verify:
//! - Partition discovery on startup
//! - Creating, closing and reopening partitions
//! - Newest-first lookups with lazy loading
//! - Write routing to the single writable partition
//! - The in-memory store behaves like the disk store

use std::fs;
use std::path::PathBuf;

use reconkv::storage::{
    DiskStore, MemoryStore, PartitionStorage, PartitionStore, PartitionedLog,
};
use reconkv::ReconError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().to_path_buf();
    (temp_dir, path)
}

/// Write each batch into its own closed partition
fn write_partitions<S: PartitionStore>(
    log: &mut PartitionedLog<S>,
    batches: &[&[(&str, &str)]],
) -> Vec<i64> {
    let mut timestamps = Vec::new();
    for batch in batches {
        let timestamp = log.create_partition().unwrap();
        for (key, value) in batch.iter() {
            log.set(key.as_bytes(), value.as_bytes()).unwrap();
        }
        log.close_partition(timestamp).unwrap();
        timestamps.push(timestamp);
    }
    timestamps
}

// =============================================================================
// Open / Discovery Tests
// =============================================================================

#[test]
fn test_open_creates_directory() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("new_storage");

    let log = PartitionedLog::open_dir(&path).unwrap();

    assert!(path.is_dir());
    assert_eq!(log.len(), 0);
    assert!(log.is_empty());
}

#[test]
fn test_discovers_partitions_newest_first() {
    let (_temp, path) = setup_temp_dir();
    fs::write(path.join("100-partition.bin"), b"").unwrap();
    fs::write(path.join("300-partition.bin"), b"").unwrap();
    fs::write(path.join("200-partition.bin"), b"").unwrap();
    fs::write(path.join("200-index.bin"), b"").unwrap();
    fs::write(path.join("notes.txt"), b"ignored").unwrap();

    let log = PartitionedLog::open_dir(&path).unwrap();

    assert_eq!(log.available_timestamps(), &[300, 200, 100]);
    assert!(log.opened_timestamps().is_empty());
    assert_eq!(log.len(), 3);
}

#[test]
fn test_malformed_partition_name_fails_open() {
    let (_temp, path) = setup_temp_dir();
    fs::write(path.join("abc-partition.bin"), b"").unwrap();

    let result = PartitionedLog::open_dir(&path);

    assert!(matches!(result, Err(ReconError::InvalidPartitionName(_))));
}

#[test]
fn test_reopen_sees_previous_partitions() {
    let (_temp, path) = setup_temp_dir();

    let timestamps = {
        let mut log = PartitionedLog::open_dir(&path).unwrap();
        write_partitions(&mut log, &[&[("k1", "v1")], &[("k2", "v2")]])
    };

    let mut log = PartitionedLog::open_dir(&path).unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log.available_timestamps(), &[timestamps[1], timestamps[0]]);
    assert_eq!(log.get(b"k1").unwrap(), b"v1".to_vec());
    assert_eq!(log.get(b"k2").unwrap(), b"v2".to_vec());
}

// =============================================================================
// Partition Lifecycle Tests
// =============================================================================

#[test]
fn test_create_and_close_partition() {
    let (_temp, path) = setup_temp_dir();
    let mut log = PartitionedLog::open_dir(&path).unwrap();

    let timestamp = log.create_partition().unwrap();
    assert_eq!(log.writable(), Some(timestamp));
    assert_eq!(log.opened_timestamps(), vec![timestamp]);

    log.close_partition(timestamp).unwrap();
    assert_eq!(log.writable(), None);
    assert!(log.opened_timestamps().is_empty());
    assert_eq!(log.available_timestamps(), &[timestamp]);
    assert_eq!(log.len(), 1);
}

#[test]
fn test_timestamps_strictly_increase() {
    let mut log = PartitionedLog::open(MemoryStore::new()).unwrap();

    let mut previous = i64::MIN;
    for _ in 0..50 {
        let timestamp = log.create_partition().unwrap();
        assert!(timestamp > previous);
        previous = timestamp;
    }
}

#[test]
fn test_new_timestamp_beats_discovered_future_partition() {
    let (_temp, path) = setup_temp_dir();
    let future = i64::MAX - 10;
    fs::write(path.join(format!("{}-partition.bin", future)), b"").unwrap();

    let mut log = PartitionedLog::open_dir(&path).unwrap();
    let timestamp = log.create_partition().unwrap();

    assert!(timestamp > future);
}

#[test]
fn test_create_closes_previous_writable() {
    let (_temp, path) = setup_temp_dir();
    let mut log = PartitionedLog::open_dir(&path).unwrap();

    let first = log.create_partition().unwrap();
    log.set(b"k", b"v").unwrap();
    let second = log.create_partition().unwrap();

    assert_eq!(log.writable(), Some(second));
    assert_eq!(log.opened_timestamps(), vec![second]);
    assert_eq!(log.available_timestamps(), &[first]);
}

#[test]
fn test_open_partition_with_data_is_read_only() {
    let (_temp, path) = setup_temp_dir();
    let mut log = PartitionedLog::open_dir(&path).unwrap();
    let timestamps = write_partitions(&mut log, &[&[("k", "v")]]);

    log.open_partition(timestamps[0]).unwrap();
    let partition = log.partition_mut(timestamps[0]).unwrap();

    assert!(!partition.is_writable());
    assert!(matches!(
        partition.set(b"k", b"v2"),
        Err(ReconError::ReadOnlyModification(_))
    ));
    assert!(log.available_timestamps().is_empty());
}

#[test]
fn test_close_all() {
    let (_temp, path) = setup_temp_dir();
    let mut log = PartitionedLog::open_dir(&path).unwrap();
    let timestamps = write_partitions(&mut log, &[&[("a", "1")], &[("b", "2")]]);
    log.open_partition(timestamps[0]).unwrap();
    log.open_partition(timestamps[1]).unwrap();
    log.create_partition().unwrap();

    log.close_all().unwrap();

    assert!(log.opened_timestamps().is_empty());
    assert_eq!(log.available_timestamps().len(), 3);
    assert_eq!(log.writable(), None);
}

#[test]
fn test_remove_partition_deletes_files() {
    let (_temp, path) = setup_temp_dir();
    let mut log = PartitionedLog::open_dir(&path).unwrap();
    let timestamps = write_partitions(&mut log, &[&[("a", "1")]]);

    log.remove_partition(timestamps[0]).unwrap();

    assert_eq!(log.len(), 0);
    assert!(!path.join(format!("{}-partition.bin", timestamps[0])).exists());
    assert!(!path.join(format!("{}-index.bin", timestamps[0])).exists());
}

// =============================================================================
// Key Operation Tests
// =============================================================================

#[test]
fn test_set_and_get() {
    let (_temp, path) = setup_temp_dir();
    let mut log = PartitionedLog::open_dir(&path).unwrap();

    log.set(b"test", b"mega test").unwrap();

    assert_eq!(log.len(), 1);
    assert_eq!(log.get(b"test").unwrap(), b"mega test".to_vec());
}

#[test]
fn test_del_reports_removed() {
    let (_temp, path) = setup_temp_dir();
    let mut log = PartitionedLog::open_dir(&path).unwrap();

    log.set(b"test", b"mega test").unwrap();
    log.del(b"test").unwrap();

    assert!(matches!(log.get(b"test"), Err(ReconError::Removed)));
}

#[test]
fn test_get_missing_key() {
    let (_temp, path) = setup_temp_dir();
    let mut log = PartitionedLog::open_dir(&path).unwrap();
    write_partitions(&mut log, &[&[("a", "1")]]);

    assert!(matches!(log.get(b"zzz"), Err(ReconError::NotFound)));
}

#[test]
fn test_set_after_close_creates_new_partition() {
    let (_temp, path) = setup_temp_dir();
    let mut log = PartitionedLog::open_dir(&path).unwrap();

    log.set(b"a", b"1").unwrap();
    let first = log.writable().unwrap();
    log.close_partition(first).unwrap();

    log.set(b"b", b"2").unwrap();

    assert_eq!(log.len(), 2);
    assert_ne!(log.writable(), Some(first));
}

#[test]
fn test_newest_partition_wins() {
    let (_temp, path) = setup_temp_dir();
    let mut log = PartitionedLog::open_dir(&path).unwrap();
    write_partitions(
        &mut log,
        &[
            &[("x", "old"), ("y", "only-old")],
            &[("x", "new")],
        ],
    );

    assert_eq!(log.get(b"x").unwrap(), b"new".to_vec());
    assert_eq!(log.get(b"y").unwrap(), b"only-old".to_vec());
}

#[test]
fn test_tombstone_stops_search() {
    let (_temp, path) = setup_temp_dir();
    let mut log = PartitionedLog::open_dir(&path).unwrap();
    let timestamps = write_partitions(&mut log, &[&[("x", "1")], &[]]);

    // Tombstone lands in a third, newer partition
    log.del(b"x").unwrap();
    let newest = log.writable().unwrap();
    log.close_partition(newest).unwrap();

    assert!(newest > timestamps[1]);
    assert!(matches!(log.get(b"x"), Err(ReconError::Removed)));
}

#[test]
fn test_lazy_loading_stops_at_first_hit() {
    let (_temp, path) = setup_temp_dir();
    let mut log = PartitionedLog::open_dir(&path).unwrap();
    let timestamps = write_partitions(
        &mut log,
        &[&[("old", "1")], &[("mid", "2")], &[("new", "3")]],
    );

    assert_eq!(log.get(b"mid").unwrap(), b"2".to_vec());

    // Only the two newest were needed
    assert_eq!(log.opened_timestamps(), vec![timestamps[2], timestamps[1]]);
    assert_eq!(log.available_timestamps(), &[timestamps[0]]);
}

#[test]
fn test_closed_newer_partition_shadows_opened_older_one() {
    let (_temp, path) = setup_temp_dir();
    let mut log = PartitionedLog::open_dir(&path).unwrap();
    let timestamps = write_partitions(&mut log, &[&[("k", "old")]]);
    log.open_partition(timestamps[0]).unwrap();

    write_partitions(&mut log, &[&[("k", "new")]]);

    assert_eq!(log.get(b"k").unwrap(), b"new".to_vec());
}

// =============================================================================
// Range Tests
// =============================================================================

#[test]
fn test_range_visits_all_newest_first() {
    let (_temp, path) = setup_temp_dir();
    let mut log = PartitionedLog::open_dir(&path).unwrap();
    let timestamps = write_partitions(&mut log, &[&[("a", "1")], &[("b", "2")], &[("c", "3")]]);

    let mut visited = Vec::new();
    log.range(|timestamp, partition| {
        assert_eq!(timestamp, partition.timestamp());
        visited.push(timestamp);
        Ok(true)
    })
    .unwrap();

    let mut expected = timestamps.clone();
    expected.reverse();
    assert_eq!(visited, expected);
    assert!(log.available_timestamps().is_empty());
}

#[test]
fn test_range_stops_when_callback_declines() {
    let (_temp, path) = setup_temp_dir();
    let mut log = PartitionedLog::open_dir(&path).unwrap();
    write_partitions(&mut log, &[&[("a", "1")], &[("b", "2")], &[("c", "3")]]);

    let mut visited = 0;
    log.range(|_, _| {
        visited += 1;
        Ok(false)
    })
    .unwrap();

    assert_eq!(visited, 1);
}

#[test]
fn test_range_propagates_callback_error() {
    let mut log = PartitionedLog::open(MemoryStore::new()).unwrap();
    log.set(b"a", b"1").unwrap();

    let result = log.range(|_, _| Err(ReconError::NotFound));

    assert!(matches!(result, Err(ReconError::NotFound)));
}

// =============================================================================
// Memory Store Tests
// =============================================================================

#[test]
fn test_memory_store_round_trip_through_reopen() {
    let store = MemoryStore::new();

    {
        let mut log = PartitionedLog::open(store.clone()).unwrap();
        write_partitions(&mut log, &[&[("k", "v1")], &[("k", "v2")]]);
    }

    let mut log = PartitionedLog::open(store.clone()).unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log.get(b"k").unwrap(), b"v2".to_vec());

    let newest = log.opened_timestamps()[0];
    let partition = log.partition_mut(newest).unwrap();
    assert!(matches!(
        partition.set(b"k", b"v3"),
        Err(ReconError::ReadOnlyModification(_))
    ));
}

#[test]
fn test_disk_store_remove_missing_partition_fails() {
    let (_temp, path) = setup_temp_dir();
    let store = DiskStore::new(&path);

    assert!(matches!(store.remove(42), Err(ReconError::Io(_))));
}
