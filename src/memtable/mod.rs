//! MemTable Module
//!
//! Write buffer and read-through cache in front of a partitioned log.
//!
//! ## Responsibilities
//! - Buffer sets and deletes in memory until `sync`
//! - Shadow the on-disk log for every buffered key
//! - Flush the buffer into one new partition per `sync`
//! - Serialize all access to the log behind a single lock
//!
//! ## Data Structure Choice
//! BTreeMap inside one parking_lot Mutex:
//! - Flushes write keys in sorted order
//! - The same lock guards the log's partition bookkeeping, so sync and
//!   compaction never interleave with reads or writes

mod table;

pub use table::MemTable;

use crate::storage::{is_tombstone, TOMBSTONE};

/// Entry stored in the MemTable
#[derive(Debug, Clone, PartialEq)]
pub enum MemTableEntry {
    /// A live value
    Value(Vec<u8>),

    /// A tombstone (deleted key)
    Tombstone,
}

impl MemTableEntry {
    /// Wrap a value written by a client.
    ///
    /// A value equal to the tombstone marker is a tombstone, the same way it
    /// reads back once flushed.
    pub fn from_value(value: &[u8]) -> Self {
        if is_tombstone(value) {
            MemTableEntry::Tombstone
        } else {
            MemTableEntry::Value(value.to_vec())
        }
    }

    /// Bytes written to a partition for this entry
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            MemTableEntry::Value(value) => value,
            MemTableEntry::Tombstone => TOMBSTONE,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, MemTableEntry::Tombstone)
    }
}
