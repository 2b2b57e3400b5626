//! MemTable implementation
//!
//! BTreeMap buffer, read cache and partitioned log behind one Mutex.

use std::collections::{BTreeMap, HashSet};

use moka::sync::Cache;
use parking_lot::Mutex;

use crate::compaction::{self, CompactionResult};
use crate::config::Config;
use crate::error::{ReconError, Result};
use crate::storage::{is_tombstone, DiskStore, PartitionStorage, PartitionStore, PartitionedLog};

use super::MemTableEntry;

/// Everything guarded by the engine lock
struct State<S: PartitionStore> {
    /// Unflushed mutations
    buffer: BTreeMap<Vec<u8>, MemTableEntry>,
    /// Approximate bytes held by `buffer`
    size: usize,
    /// Values recently read from the log, `None` when disabled
    cache: Option<Cache<Vec<u8>, Vec<u8>>>,
    log: PartitionedLog<S>,
}

/// In-memory table for recent writes, in front of a [`PartitionedLog`]
///
/// ## Concurrency
/// One `parking_lot::Mutex` guards the buffer and the log. Every operation,
/// reads included, holds it for its whole duration: reads may load
/// partitions and so mutate the log's bookkeeping.
pub struct MemTable<S: PartitionStore = DiskStore> {
    state: Mutex<State<S>>,

    /// Buffered size that triggers a sync (0 = never)
    size_limit: usize,
}

impl MemTable<DiskStore> {
    /// Open a disk-backed table in `config.data_dir`
    pub fn open(config: &Config) -> Result<Self> {
        let log = PartitionedLog::open_dir(&config.data_dir)?;
        tracing::info!(
            data_dir = %config.data_dir.display(),
            partitions = log.len(),
            "Opened memtable"
        );
        Ok(Self::new(log, config))
    }
}

impl<S: PartitionStore> MemTable<S> {
    /// Put a table in front of an existing log
    pub fn new(log: PartitionedLog<S>, config: &Config) -> Self {
        Self {
            state: Mutex::new(State {
                buffer: BTreeMap::new(),
                size: 0,
                cache: read_cache(config.read_cache_capacity),
                log,
            }),
            size_limit: config.memtable_size_limit,
        }
    }

    /// Get a value by key.
    ///
    /// Search order:
    /// 1. Buffer (a buffered delete hides anything on disk)
    /// 2. Read cache
    /// 3. Partitioned log, newest → oldest
    ///
    /// A deleted key is reported as `NotFound`, never `Removed`.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(entry) = state.buffer.get(key) {
            return match entry {
                MemTableEntry::Value(value) => Ok(value.clone()),
                MemTableEntry::Tombstone => Err(ReconError::NotFound),
            };
        }
        if let Some(value) = state.cache.as_ref().and_then(|cache| cache.get(key)) {
            return Ok(value);
        }

        match state.log.get(key) {
            Ok(value) => {
                if let Some(cache) = &state.cache {
                    cache.insert(key.to_vec(), value.clone());
                }
                Ok(value)
            }
            Err(ReconError::Removed) => Err(ReconError::NotFound),
            Err(e) => Err(e),
        }
    }

    /// Buffer a value, superseding any earlier buffered one
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.write(key, MemTableEntry::from_value(value))
    }

    /// Buffer a tombstone.
    ///
    /// Recorded even if the key is nowhere to be found: the log may hold it
    /// in a partition that has not been loaded.
    pub fn del(&self, key: &[u8]) -> Result<()> {
        self.write(key, MemTableEntry::Tombstone)
    }

    /// Visit `(key, value)` pairs whose key contains `pattern`.
    ///
    /// Buffered entries come first, then entries of the log (newest partition
    /// first) whose key is not buffered. Each key is reported at most once,
    /// with its newest value; deleted keys are skipped. Returning `false`
    /// from `f` stops the scan.
    pub fn scan<F>(&self, pattern: &[u8], mut f: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        for (key, entry) in &state.buffer {
            if let MemTableEntry::Value(value) = entry {
                if contains(key, pattern) && !f(key.as_slice(), value.as_slice()) {
                    return Ok(());
                }
            }
        }

        let buffer = &state.buffer;
        let mut seen: HashSet<Vec<u8>> = HashSet::new();
        let mut stopped = false;

        state.log.range(|_, partition| {
            partition.range(&mut |key: &[u8], value: &[u8]| {
                if buffer.contains_key(key) || !contains(key, pattern) || seen.contains(key) {
                    return true;
                }
                seen.insert(key.to_vec());

                if is_tombstone(value) {
                    return true;
                }
                if !f(key, value) {
                    stopped = true;
                    return false;
                }
                true
            })?;
            Ok(!stopped)
        })
    }

    /// Flush the buffer into one new partition.
    ///
    /// Entries leave the buffer one by one as they are written; on failure
    /// the buffer keeps exactly the entries that were not written. The new
    /// partition is closed either way. An empty buffer is a no-op.
    ///
    /// Returns the number of entries written.
    pub fn sync(&self) -> Result<usize> {
        let mut guard = self.state.lock();
        guard.sync()
    }

    /// Merge every partition of the log into one
    pub fn compact(&self) -> Result<CompactionResult> {
        let mut guard = self.state.lock();
        guard.clear_cache();
        compaction::merge_sort(&mut guard.log)
    }

    /// Sync the buffer and close every partition
    pub fn close(self) -> Result<()> {
        let mut state = self.state.into_inner();
        state.sync()?;
        state.log.close_all()
    }

    /// Run `f` with exclusive access to the log.
    ///
    /// The read cache is dropped afterwards, as `f` may have written to the
    /// log behind the table's back.
    pub fn with_log<R>(&self, f: impl FnOnce(&mut PartitionedLog<S>) -> R) -> R {
        let mut guard = self.state.lock();
        let result = f(&mut guard.log);
        guard.clear_cache();
        result
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of buffered (unflushed) entries
    pub fn len(&self) -> usize {
        self.state.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().buffer.is_empty()
    }

    /// Approximate bytes held by the buffer
    pub fn size(&self) -> usize {
        self.state.lock().size
    }

    /// Number of partitions in the log
    pub fn partition_count(&self) -> usize {
        self.state.lock().log.len()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn write(&self, key: &[u8], entry: MemTableEntry) -> Result<()> {
        let mut guard = self.state.lock();
        guard.put(key.to_vec(), entry);

        if self.size_limit > 0 && guard.size >= self.size_limit {
            tracing::debug!(size = guard.size, limit = self.size_limit, "MemTable full, syncing");
            guard.sync()?;
        }
        Ok(())
    }
}

impl<S: PartitionStore> State<S> {
    fn put(&mut self, key: Vec<u8>, entry: MemTableEntry) {
        if let Some(cache) = &self.cache {
            cache.invalidate(key.as_slice());
        }
        let key_len = key.len();
        self.size += key_len + entry.as_bytes().len();
        if let Some(old) = self.buffer.insert(key, entry) {
            self.size -= key_len + old.as_bytes().len();
        }
    }

    fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
    }

    fn sync(&mut self) -> Result<usize> {
        if self.buffer.is_empty() {
            return Ok(0);
        }

        let timestamp = self.log.create_partition()?;
        let written = self.flush_into(timestamp);
        let closed = self.log.close_partition(timestamp);

        let written = written?;
        closed?;

        tracing::info!(partition = timestamp, entries = written, "Synced memtable");
        Ok(written)
    }

    fn flush_into(&mut self, timestamp: i64) -> Result<usize> {
        let partition = self
            .log
            .partition_mut(timestamp)
            .ok_or(ReconError::PartitionClosed(timestamp))?;

        let mut written = 0;
        while let Some((key, entry)) = self.buffer.pop_first() {
            if let Err(e) = partition.set(&key, entry.as_bytes()) {
                self.buffer.insert(key, entry);
                return Err(e);
            }
            self.size -= entry_size(&key, &entry);
            written += 1;
        }
        Ok(written)
    }
}

/// Bounded cache of disk reads; a capacity of 0 disables it
fn read_cache(capacity: usize) -> Option<Cache<Vec<u8>, Vec<u8>>> {
    (capacity > 0).then(|| Cache::builder().max_capacity(capacity as u64).build())
}

fn entry_size(key: &[u8], entry: &MemTableEntry) -> usize {
    key.len() + entry.as_bytes().len()
}

/// Byte-wise substring test; an empty pattern matches everything
fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}
