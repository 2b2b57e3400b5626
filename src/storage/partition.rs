//! Log Partition
//!
//! One append-only data file plus its persisted key → location index.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{ReconError, Result};

use super::index::{self, IndexEntry, PartitionIndex};
use super::{is_tombstone, PartitionStorage};

/// Suffix of partition data files
pub(crate) const DATA_SUFFIX: &str = "-partition.bin";

/// Suffix of partition index files
pub(crate) const INDEX_SUFFIX: &str = "-index.bin";

/// File-backed partition
///
/// ## Lifecycle
/// - Opened with an empty data file → writable for this session
/// - Opened with existing data → read-only (the append position of a
///   previous session is never resumed)
/// - Closed → data fsync'd, index persisted, file handle released
pub struct LogPartition {
    /// Creation timestamp (ID and sort key)
    timestamp: i64,
    /// Path of `{T}-partition.bin`
    data_path: PathBuf,
    /// Path of `{T}-index.bin`
    index_path: PathBuf,
    /// Data file handle, `None` once closed
    file: Option<File>,
    /// In-memory index: key → latest location in this partition
    index: PartitionIndex,
    /// Current data file size
    size: u64,
    /// Whether `set`/`del` are accepted
    writable: bool,
}

impl LogPartition {
    /// Open or create the partition `timestamp` inside `dir`
    pub fn open(dir: &Path, timestamp: i64) -> Result<Self> {
        let data_path = data_path(dir, timestamp);
        let index_path = index_path(dir, timestamp);

        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&data_path)?;
        let size = file.metadata()?.len();

        let index = index::load(&index_path)?;

        // An index pointing past the data means the data file lost writes
        if let Some((key, entry)) = index.iter().find(|(_, e)| e.end() > size) {
            return Err(ReconError::Corruption(format!(
                "partition {}: key {:?} indexed at {}..{} but data file has {} bytes",
                timestamp,
                String::from_utf8_lossy(key),
                entry.offset,
                entry.end(),
                size
            )));
        }

        let writable = size == 0;
        tracing::debug!(timestamp, size, keys = index.len(), writable, "Opened partition");

        Ok(Self {
            timestamp,
            data_path,
            index_path,
            file: Some(file),
            index,
            size,
            writable,
        })
    }

    /// Path of the data file
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Path of the index file
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Current size of the data file in bytes (dead bytes included)
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether the data file handle has been released
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Location of `key`, if indexed
    pub fn index_entry(&self, key: &[u8]) -> Option<IndexEntry> {
        self.index.get(key).copied()
    }

    fn file(&mut self) -> Result<&mut File> {
        let timestamp = self.timestamp;
        self.file
            .as_mut()
            .ok_or(ReconError::PartitionClosed(timestamp))
    }
}

impl PartitionStorage for LogPartition {
    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn get(&mut self, key: &[u8]) -> Result<Vec<u8>> {
        let entry = self.index_entry(key).ok_or(ReconError::NotFound)?;
        let value = read_value(self.file()?, entry)?;

        if is_tombstone(&value) {
            return Err(ReconError::Removed);
        }
        Ok(value)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if !self.writable {
            return Err(ReconError::ReadOnlyModification(self.timestamp));
        }
        let length = u32::try_from(value.len()).map_err(|_| {
            ReconError::Config(format!("value of {} bytes is too large", value.len()))
        })?;

        // Append mode: every write lands at the end regardless of seeks.
        // The value must be durable before an index pointing at it is.
        let file = self.file()?;
        file.write_all(value)?;
        file.sync_data()?;
        self.size += length as u64;

        self.index.insert(
            key.to_vec(),
            IndexEntry {
                offset: self.size - length as u64,
                length,
            },
        );
        tracing::trace!(timestamp = self.timestamp, key_len = key.len(), length, "Appended value");

        index::save(&self.index_path, &self.index)
    }

    fn range(&mut self, f: &mut dyn FnMut(&[u8], &[u8]) -> bool) -> Result<()> {
        let timestamp = self.timestamp;
        let file = self
            .file
            .as_mut()
            .ok_or(ReconError::PartitionClosed(timestamp))?;

        for (key, entry) in &self.index {
            let value = read_value(file, *entry)?;
            if !f(key.as_slice(), &value) {
                break;
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let Some(file) = self.file.as_ref() else {
            return Ok(());
        };

        file.sync_all()?;
        index::save(&self.index_path, &self.index)?;

        self.file = None;
        self.writable = false;
        tracing::debug!(timestamp = self.timestamp, size = self.size, "Closed partition");

        Ok(())
    }
}

/// Read `entry.length` bytes at `entry.offset`
fn read_value(file: &mut File, entry: IndexEntry) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(entry.offset))?;
    let mut value = vec![0u8; entry.length as usize];
    file.read_exact(&mut value)?;
    Ok(value)
}

// =============================================================================
// File naming
// =============================================================================

pub(crate) fn data_path(dir: &Path, timestamp: i64) -> PathBuf {
    dir.join(format!("{}{}", timestamp, DATA_SUFFIX))
}

pub(crate) fn index_path(dir: &Path, timestamp: i64) -> PathBuf {
    dir.join(format!("{}{}", timestamp, INDEX_SUFFIX))
}

/// Parse a partition timestamp from a file name.
///
/// "1700000000000000000-partition.bin" → Ok(Some(1700000000000000000))
/// "1-index.bin" → Ok(None)
/// "abc-partition.bin" → Err(InvalidPartitionName)
pub(crate) fn parse_timestamp(file_name: &str) -> Result<Option<i64>> {
    let Some(prefix) = file_name.strip_suffix(DATA_SUFFIX) else {
        return Ok(None);
    };
    prefix
        .parse()
        .map(Some)
        .map_err(|_| ReconError::InvalidPartitionName(file_name.to_string()))
}

/// Unlink both files of a partition. A missing index is not an error.
pub(crate) fn remove_files(dir: &Path, timestamp: i64) -> Result<()> {
    fs::remove_file(data_path(dir, timestamp))?;
    match fs::remove_file(index_path(dir, timestamp)) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}
