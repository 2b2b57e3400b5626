//! Partitioned Log
//!
//! Manages the chain of partitions and resolves reads/writes across them.
//!
//! ## Responsibilities
//! - Discover existing partitions on startup (as "available", not loaded)
//! - Search opened partitions newest → oldest, then lazily load available ones
//! - Route writes to the single writable partition
//! - Track partition lifecycle: create → close → reopen → remove

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{ReconError, Result};

use super::{DiskStore, PartitionStorage, PartitionStore};

/// Ordered collection of partitions over a [`PartitionStore`]
///
/// ## Invariants
/// - `opened` and `available` are disjoint, both sorted newest → oldest
/// - At most one partition is designated writable (`writable`); it is always
///   in `opened`
/// - New timestamps are strictly greater than every timestamp seen so far
///
/// All mutating methods take `&mut self`; callers sharing a log across
/// threads wrap it in one lock (see [`crate::memtable::MemTable`]).
pub struct PartitionedLog<S: PartitionStore = DiskStore> {
    /// Where partitions are created, discovered and removed
    store: S,

    /// Loaded partitions, newest first
    opened: Vec<S::Partition>,

    /// Known on-store but not loaded, newest first
    available: Vec<i64>,

    /// Partition receiving `set`/`del`, if any
    writable: Option<i64>,

    /// Highest timestamp ever seen by this log
    last_timestamp: i64,
}

impl PartitionedLog<DiskStore> {
    /// Open a disk-backed log rooted at `path`, creating the directory if needed
    pub fn open_dir(path: &Path) -> Result<Self> {
        Self::open(DiskStore::create(path)?)
    }
}

impl<S: PartitionStore> PartitionedLog<S> {
    /// Open a log over `store`.
    ///
    /// Every existing partition becomes "available"; nothing is loaded yet.
    pub fn open(store: S) -> Result<Self> {
        let mut available = store.discover()?;
        available.sort_unstable_by(|a, b| b.cmp(a));
        available.dedup();

        let last_timestamp = available.first().copied().unwrap_or(0);
        tracing::debug!(partitions = available.len(), last_timestamp, "Opened partitioned log");

        Ok(Self {
            store,
            opened: Vec::new(),
            available,
            writable: None,
            last_timestamp,
        })
    }

    // =========================================================================
    // Partition lifecycle
    // =========================================================================

    /// Create a new writable partition and return its timestamp.
    ///
    /// The previous writable partition, if any, is closed first.
    pub fn create_partition(&mut self) -> Result<i64> {
        if let Some(previous) = self.writable {
            self.close_partition(previous)?;
        }

        let timestamp = self.next_timestamp();
        let idx = self.load_partition(timestamp)?;
        if !self.opened[idx].is_writable() {
            return Err(ReconError::ReadOnlyModification(timestamp));
        }
        self.writable = Some(timestamp);

        tracing::debug!(timestamp, "Created partition");
        Ok(timestamp)
    }

    /// Close an opened partition and move it to the available set.
    ///
    /// Closing a partition that is not opened does nothing.
    pub fn close_partition(&mut self, timestamp: i64) -> Result<()> {
        let Some(idx) = self.opened_index(timestamp) else {
            return Ok(());
        };

        self.opened[idx].close()?;
        self.opened.remove(idx);
        if self.writable == Some(timestamp) {
            self.writable = None;
        }
        insert_descending(&mut self.available, timestamp);

        Ok(())
    }

    /// Load the partition `timestamp` into the opened set.
    ///
    /// It is writable only if it holds no data; it is never designated as
    /// the log's write target (use [`create_partition`](Self::create_partition)).
    pub fn open_partition(&mut self, timestamp: i64) -> Result<()> {
        self.load_partition(timestamp).map(|_| ())
    }

    /// Close every opened partition
    pub fn close_all(&mut self) -> Result<()> {
        let timestamps: Vec<i64> = self.opened.iter().map(|p| p.timestamp()).collect();
        for timestamp in timestamps {
            self.close_partition(timestamp)?;
        }
        Ok(())
    }

    /// Delete a partition from the log and from the store
    pub fn remove_partition(&mut self, timestamp: i64) -> Result<()> {
        if let Some(idx) = self.opened_index(timestamp) {
            self.opened[idx].close()?;
            self.opened.remove(idx);
            if self.writable == Some(timestamp) {
                self.writable = None;
            }
        }
        self.available.retain(|&t| t != timestamp);

        self.store.remove(timestamp)
    }

    // =========================================================================
    // Key operations
    // =========================================================================

    /// Find the newest value of `key`.
    ///
    /// Returns:
    /// - `Ok(value)`: newest partition holding the key has a live value
    /// - `Err(Removed)`: newest partition holding the key has a tombstone
    /// - `Err(NotFound)`: no partition holds the key
    pub fn get(&mut self, key: &[u8]) -> Result<Vec<u8>> {
        // Walk opened partitions, loading an available one whenever it is
        // newer than the next opened candidate. A closed partition may be
        // newer than one that is still loaded.
        let mut next = 0;
        loop {
            let opened = self.opened.get(next).map(|p| p.timestamp());
            let available = self.available.first().copied();

            let idx = match (opened, available) {
                (None, None) => return Err(ReconError::NotFound),
                (Some(o), Some(a)) if a > o => self.load_partition(a)?,
                (None, Some(a)) => self.load_partition(a)?,
                (Some(_), _) => next,
            };

            match self.opened[idx].get(key) {
                Err(ReconError::NotFound) => next = idx + 1,
                result => return result,
            }
        }
    }

    /// Write `value` into the writable partition, creating one if needed
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.writable_partition()?.set(key, value)
    }

    /// Record a tombstone for `key` in the writable partition
    pub fn del(&mut self, key: &[u8]) -> Result<()> {
        self.writable_partition()?.del(key)
    }

    /// Load every available partition, then call `f(timestamp, partition)`
    /// newest → oldest until it returns `Ok(false)`.
    pub fn range<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(i64, &mut S::Partition) -> Result<bool>,
    {
        while let Some(&timestamp) = self.available.first() {
            self.load_partition(timestamp)?;
        }

        for partition in self.opened.iter_mut() {
            if !f(partition.timestamp(), partition)? {
                break;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Total number of partitions (opened + available)
    pub fn len(&self) -> usize {
        self.opened.len() + self.available.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every partition timestamp, newest first
    pub fn timestamps(&self) -> Vec<i64> {
        let mut all: Vec<i64> = self
            .opened
            .iter()
            .map(|p| p.timestamp())
            .chain(self.available.iter().copied())
            .collect();
        all.sort_unstable_by(|a, b| b.cmp(a));
        all
    }

    /// Timestamps of loaded partitions, newest first
    pub fn opened_timestamps(&self) -> Vec<i64> {
        self.opened.iter().map(|p| p.timestamp()).collect()
    }

    /// Timestamps of known but unloaded partitions, newest first
    pub fn available_timestamps(&self) -> &[i64] {
        &self.available
    }

    /// Timestamp of the current write target
    pub fn writable(&self) -> Option<i64> {
        self.writable
    }

    /// Borrow an opened partition
    pub fn partition_mut(&mut self, timestamp: i64) -> Option<&mut S::Partition> {
        self.opened.iter_mut().find(|p| p.timestamp() == timestamp)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn opened_index(&self, timestamp: i64) -> Option<usize> {
        self.opened.iter().position(|p| p.timestamp() == timestamp)
    }

    /// Open `timestamp` (if not already) and return its index in `opened`
    fn load_partition(&mut self, timestamp: i64) -> Result<usize> {
        if let Some(idx) = self.opened_index(timestamp) {
            return Ok(idx);
        }

        let partition = self.store.open(timestamp)?;
        self.available.retain(|&t| t != timestamp);
        self.last_timestamp = self.last_timestamp.max(timestamp);

        let idx = self
            .opened
            .iter()
            .position(|p| p.timestamp() < timestamp)
            .unwrap_or(self.opened.len());
        self.opened.insert(idx, partition);

        Ok(idx)
    }

    fn writable_partition(&mut self) -> Result<&mut S::Partition> {
        let timestamp = match self.writable {
            Some(timestamp) => timestamp,
            None => self.create_partition()?,
        };
        self.partition_mut(timestamp)
            .ok_or(ReconError::PartitionClosed(timestamp))
    }

    /// Wall clock in nanoseconds, bumped past the last timestamp if the
    /// clock stalls or goes backwards
    fn next_timestamp(&mut self) -> i64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
            .unwrap_or(0);

        let timestamp = now.max(self.last_timestamp.saturating_add(1));
        self.last_timestamp = timestamp;
        timestamp
    }
}

/// Insert keeping `list` sorted newest → oldest, without duplicates
fn insert_descending(list: &mut Vec<i64>, timestamp: i64) {
    match list.binary_search_by(|probe| timestamp.cmp(probe)) {
        Ok(_) => {}
        Err(pos) => list.insert(pos, timestamp),
    }
}
