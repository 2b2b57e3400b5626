//! Storage Module
//!
//! Persistent storage layer built from timestamped, append-only partitions.
//!
//! ## Responsibilities
//! - Persist values to disk as raw append-only runs
//! - Keep a key → location index per partition, rewritten on every write
//! - Resolve lookups across partitions newest → oldest
//! - Discover existing partitions on startup
//!
//! ## File Layout
//! ```text
//! {data_dir}/
//! ├── {T}-partition.bin    raw value bytes, no framing
//! │   ┌────────┬────────┬────────┬─────┐
//! │   │ value1 │ value2 │ value1'│ ... │   (boundaries live in the index)
//! │   └────────┴────────┴────────┴─────┘
//! └── {T}-index.bin        [CRC32 (4)][bincode(key → {offset, length})]
//! ```
//!
//! `T` is the partition creation timestamp in nanoseconds. It doubles as the
//! partition ID and as the sort key: higher timestamps shadow lower ones.

mod disk;
mod index;
mod log;
mod memory;
mod partition;

pub use disk::DiskStore;
pub use index::{IndexEntry, PartitionIndex};
pub use log::PartitionedLog;
pub use memory::{MemoryPartition, MemoryStore};
pub use partition::LogPartition;

use crate::error::Result;

/// Value recorded in place of real data to mark a deleted key.
///
/// A real value equal to these bytes cannot be told apart from a delete.
pub const TOMBSTONE: &[u8] = &[0x04];

/// Returns true if `value` is the tombstone marker
pub fn is_tombstone(value: &[u8]) -> bool {
    value == TOMBSTONE
}

/// Capabilities of a single partition.
///
/// [`LogPartition`] is the file-backed implementation; [`MemoryPartition`]
/// keeps everything in RAM.
pub trait PartitionStorage {
    /// Creation timestamp, used as ID and sort key
    fn timestamp(&self) -> i64;

    /// Whether this partition accepts `set`/`del`
    fn is_writable(&self) -> bool;

    /// Number of distinct keys indexed (tombstones included)
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a key.
    ///
    /// Returns:
    /// - `Ok(value)`: key found with a live value
    /// - `Err(Removed)`: newest value in this partition is a tombstone
    /// - `Err(NotFound)`: key not in this partition
    fn get(&mut self, key: &[u8]) -> Result<Vec<u8>>;

    /// Append a value and make the index durable
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Record a tombstone for `key`
    fn del(&mut self, key: &[u8]) -> Result<()> {
        self.set(key, TOMBSTONE)
    }

    /// Visit every indexed key with its raw value (tombstones included)
    /// until the callback returns `false`.
    fn range(&mut self, f: &mut dyn FnMut(&[u8], &[u8]) -> bool) -> Result<()>;

    /// Flush to stable storage and release resources
    fn close(&mut self) -> Result<()>;
}

/// A place partitions live: creates, discovers and deletes them.
pub trait PartitionStore {
    type Partition: PartitionStorage;

    /// Timestamps of every partition that already exists
    fn discover(&self) -> Result<Vec<i64>>;

    /// Open (or create) the partition for `timestamp`.
    ///
    /// The partition is writable only if it holds no data yet.
    fn open(&self, timestamp: i64) -> Result<Self::Partition>;

    /// Permanently delete a partition's data and index
    fn remove(&self, timestamp: i64) -> Result<()>;
}
