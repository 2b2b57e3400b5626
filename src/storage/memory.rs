//! In-memory partition store
//!
//! Same contract as the disk store with nothing touching the filesystem.
//! Cloned stores share their partitions, so "reopening" a log on a clone
//! sees everything written through any other clone.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{ReconError, Result};

use super::index::{IndexEntry, PartitionIndex};
use super::{is_tombstone, PartitionStorage, PartitionStore};

/// Backing bytes of one in-memory partition
#[derive(Debug, Default)]
struct Segment {
    data: Vec<u8>,
    index: PartitionIndex,
}

impl Segment {
    fn value(&self, entry: IndexEntry) -> &[u8] {
        &self.data[entry.offset as usize..entry.end() as usize]
    }
}

/// Partition whose data and index live in RAM
pub struct MemoryPartition {
    timestamp: i64,
    segment: Arc<Mutex<Segment>>,
    writable: bool,
    closed: bool,
}

impl MemoryPartition {
    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(ReconError::PartitionClosed(self.timestamp));
        }
        Ok(())
    }
}

impl PartitionStorage for MemoryPartition {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn len(&self) -> usize {
        self.segment.lock().index.len()
    }

    fn get(&mut self, key: &[u8]) -> Result<Vec<u8>> {
        self.check_open()?;
        let segment = self.segment.lock();
        let entry = segment.index.get(key).copied().ok_or(ReconError::NotFound)?;

        let value = segment.value(entry);
        if is_tombstone(value) {
            return Err(ReconError::Removed);
        }
        Ok(value.to_vec())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_open()?;
        if !self.writable {
            return Err(ReconError::ReadOnlyModification(self.timestamp));
        }
        let length = u32::try_from(value.len()).map_err(|_| {
            ReconError::Config(format!("value of {} bytes is too large", value.len()))
        })?;

        let mut segment = self.segment.lock();
        segment.data.extend_from_slice(value);
        let offset = segment.data.len() as u64 - length as u64;
        segment.index.insert(key.to_vec(), IndexEntry { offset, length });

        Ok(())
    }

    fn range(&mut self, f: &mut dyn FnMut(&[u8], &[u8]) -> bool) -> Result<()> {
        self.check_open()?;
        let segment = self.segment.lock();

        for (key, entry) in &segment.index {
            if !f(key.as_slice(), segment.value(*entry)) {
                break;
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.writable = false;
        Ok(())
    }
}

/// Partition store kept entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    segments: Arc<Mutex<BTreeMap<i64, Arc<Mutex<Segment>>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of partitions currently held
    pub fn partition_count(&self) -> usize {
        self.segments.lock().len()
    }
}

impl PartitionStore for MemoryStore {
    type Partition = MemoryPartition;

    fn discover(&self) -> Result<Vec<i64>> {
        Ok(self.segments.lock().keys().rev().copied().collect())
    }

    fn open(&self, timestamp: i64) -> Result<MemoryPartition> {
        let segment = Arc::clone(self.segments.lock().entry(timestamp).or_default());
        let writable = segment.lock().data.is_empty();

        Ok(MemoryPartition {
            timestamp,
            segment,
            writable,
            closed: false,
        })
    }

    fn remove(&self, timestamp: i64) -> Result<()> {
        self.segments.lock().remove(&timestamp);
        Ok(())
    }
}
