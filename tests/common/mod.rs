//! Shared test helpers
//!
//! `FailStore` wraps a `MemoryStore` and fails partition writes once a shared
//! write budget runs out.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use reconkv::storage::{MemoryPartition, MemoryStore, PartitionStorage, PartitionStore};
use reconkv::{ReconError, Result};

/// Memory store whose partitions accept only `budget` more writes
#[derive(Clone)]
pub struct FailStore {
    inner: MemoryStore,
    budget: Arc<AtomicUsize>,
}

impl FailStore {
    /// Start with unlimited writes
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            budget: Arc::new(AtomicUsize::new(usize::MAX)),
        }
    }

    /// Allow exactly `writes` more partition writes
    pub fn set_budget(&self, writes: usize) {
        self.budget.store(writes, Ordering::SeqCst);
    }

    pub fn partition_count(&self) -> usize {
        self.inner.partition_count()
    }
}

impl PartitionStore for FailStore {
    type Partition = FailPartition;

    fn discover(&self) -> Result<Vec<i64>> {
        self.inner.discover()
    }

    fn open(&self, timestamp: i64) -> Result<FailPartition> {
        Ok(FailPartition {
            inner: self.inner.open(timestamp)?,
            budget: Arc::clone(&self.budget),
        })
    }

    fn remove(&self, timestamp: i64) -> Result<()> {
        self.inner.remove(timestamp)
    }
}

pub struct FailPartition {
    inner: MemoryPartition,
    budget: Arc<AtomicUsize>,
}

impl PartitionStorage for FailPartition {
    fn timestamp(&self) -> i64 {
        self.inner.timestamp()
    }

    fn is_writable(&self) -> bool {
        self.inner.is_writable()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn get(&mut self, key: &[u8]) -> Result<Vec<u8>> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let spent = self
            .budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
        if spent.is_err() {
            return Err(ReconError::Io(io::Error::new(
                io::ErrorKind::Other,
                "write budget exhausted",
            )));
        }
        self.inner.set(key, value)
    }

    fn range(&mut self, f: &mut dyn FnMut(&[u8], &[u8]) -> bool) -> Result<()> {
        self.inner.range(f)
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}
