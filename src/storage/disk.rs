//! Disk Store
//!
//! Default partition store: one directory of `{T}-partition.bin` /
//! `{T}-index.bin` pairs.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

use super::partition::{self, LogPartition};
use super::PartitionStore;

/// Partition store rooted at a single directory
#[derive(Debug, Clone)]
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    /// Use `dir` as the base directory (it must already exist)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create `dir` if needed and use it as the base directory
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Base directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl PartitionStore for DiskStore {
    type Partition = LogPartition;

    /// Scan the directory for `*-partition.bin`, newest first.
    ///
    /// A file with the suffix but no integer prefix fails the whole scan.
    fn discover(&self) -> Result<Vec<i64>> {
        let mut timestamps = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(timestamp) = partition::parse_timestamp(name)? {
                timestamps.push(timestamp);
            }
        }

        timestamps.sort_unstable_by(|a, b| b.cmp(a));
        Ok(timestamps)
    }

    fn open(&self, timestamp: i64) -> Result<LogPartition> {
        LogPartition::open(&self.dir, timestamp)
    }

    fn remove(&self, timestamp: i64) -> Result<()> {
        partition::remove_files(&self.dir, timestamp)?;
        tracing::debug!(timestamp, dir = %self.dir.display(), "Removed partition files");
        Ok(())
    }
}
