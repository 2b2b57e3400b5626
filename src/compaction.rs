//! Compaction Module
//!
//! Merges every partition of a log into one.
//!
//! ## Steps
//! 1. Close all opened partitions (indexes durable, nothing mid-write)
//! 2. Collect the newest value of every key, newest partition first
//! 3. Drop keys whose newest value is a tombstone
//! 4. Write survivors into a fresh partition and close it
//! 5. Delete the old partitions, oldest first
//!
//! Old partitions are deleted only once the merged one is durable. Deleting
//! oldest first means the partitions left behind by a crash mid-way are
//! always the newest ones, so a dropped tombstone can never uncover an older
//! value.

use std::collections::BTreeMap;

use crate::error::{ReconError, Result};
use crate::storage::{is_tombstone, PartitionStorage, PartitionStore, PartitionedLog};

/// Outcome of a [`merge_sort`] run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactionResult {
    /// Number of partitions merged (and deleted)
    pub partitions_merged: usize,

    /// Live keys written to the merged partition
    pub keys_written: usize,

    /// Keys dropped because their newest value was a tombstone
    pub tombstones_dropped: usize,

    /// Timestamp of the merged partition, `None` when nothing was done
    pub merged_partition: Option<i64>,
}

/// Merge every partition of `log` into a single new one.
///
/// A log with at most one partition is left alone. On return the log holds
/// exactly the merged partition, opened read-only; the next write creates a
/// new partition.
pub fn merge_sort<S: PartitionStore>(log: &mut PartitionedLog<S>) -> Result<CompactionResult> {
    log.close_all()?;

    if log.len() <= 1 {
        tracing::debug!(partitions = log.len(), "Nothing to compact");
        return Ok(CompactionResult::default());
    }

    let old = log.timestamps();

    // First occurrence wins: partitions are visited newest → oldest
    let mut values: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
    log.range(|_, partition| {
        partition.range(&mut |key: &[u8], value: &[u8]| {
            if !values.contains_key(key) {
                values.insert(key.to_vec(), value.to_vec());
            }
            true
        })?;
        Ok(true)
    })?;

    let seen = values.len();
    values.retain(|_, value| !is_tombstone(value));
    let tombstones_dropped = seen - values.len();

    let merged = log.create_partition()?;
    if let Err(e) = write_merged(log, merged, &values) {
        if let Err(cleanup) = log.remove_partition(merged) {
            tracing::warn!(partition = merged, error = %cleanup, "Failed to discard partial merge");
        }
        return Err(e);
    }
    log.close_partition(merged)?;

    for &timestamp in old.iter().rev() {
        log.remove_partition(timestamp)?;
    }
    log.open_partition(merged)?;

    let result = CompactionResult {
        partitions_merged: old.len(),
        keys_written: values.len(),
        tombstones_dropped,
        merged_partition: Some(merged),
    };
    tracing::info!(
        partitions = result.partitions_merged,
        keys = result.keys_written,
        tombstones = result.tombstones_dropped,
        merged,
        "Compaction finished"
    );

    Ok(result)
}

fn write_merged<S: PartitionStore>(
    log: &mut PartitionedLog<S>,
    timestamp: i64,
    values: &BTreeMap<Vec<u8>, Vec<u8>>,
) -> Result<()> {
    let partition = log
        .partition_mut(timestamp)
        .ok_or(ReconError::PartitionClosed(timestamp))?;

    for (key, value) in values {
        partition.set(key, value)?;
    }
    Ok(())
}
