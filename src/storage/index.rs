//! Partition index persistence
//!
//! The whole index is rewritten on every change. It is written to a
//! temporary file, synced, then renamed over the old one so a crash leaves
//! either the previous or the new index, never a torn one.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ReconError, Result};

/// Location of one value inside a partition data file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Byte offset of the value in the data file
    pub offset: u64,
    /// Length of the value in bytes
    pub length: u32,
}

impl IndexEntry {
    /// Offset one past the last byte of the value
    pub fn end(&self) -> u64 {
        self.offset + self.length as u64
    }
}

/// Key → most recent location within a single partition
pub type PartitionIndex = BTreeMap<Vec<u8>, IndexEntry>;

/// Size of the CRC32 prefix
const CRC_SIZE: usize = 4;

/// Serialize an index: `[crc32 of payload (4, LE)][bincode payload]`
pub(crate) fn encode(index: &PartitionIndex) -> Result<Vec<u8>> {
    let payload = bincode::serialize(index)?;

    let mut buf = Vec::with_capacity(CRC_SIZE + payload.len());
    buf.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Deserialize an index written by [`encode`].
///
/// Empty input is an empty index (freshly created partition).
pub(crate) fn decode(bytes: &[u8]) -> Result<PartitionIndex> {
    if bytes.is_empty() {
        return Ok(PartitionIndex::new());
    }
    if bytes.len() < CRC_SIZE {
        return Err(ReconError::Corruption(format!(
            "index too short: {} bytes",
            bytes.len()
        )));
    }

    let (crc_bytes, payload) = bytes.split_at(CRC_SIZE);
    let expected = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
    let actual = crc32fast::hash(payload);
    if expected != actual {
        return Err(ReconError::Corruption(format!(
            "index checksum mismatch: expected {:08x}, got {:08x}",
            expected, actual
        )));
    }

    Ok(bincode::deserialize(payload)?)
}

/// Load an index file; a missing file is an empty index
pub(crate) fn load(path: &Path) -> Result<PartitionIndex> {
    match fs::read(path) {
        Ok(bytes) => decode(&bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(PartitionIndex::new()),
        Err(e) => Err(e.into()),
    }
}

/// Durably replace the index file at `path`
pub(crate) fn save(path: &Path, index: &PartitionIndex) -> Result<()> {
    let bytes = encode(index)?;
    let tmp = temp_path(path);

    {
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;

    Ok(())
}

/// "{T}-index.bin" → "{T}-index.bin.tmp"
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
