//! Configuration for ReconKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Main configuration for a ReconKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding every partition file pair:
    ///   {data_dir}/
    ///     ├── {T}-partition.bin   (raw value bytes)
    ///     └── {T}-index.bin       (key → offset/length index)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// Approximate buffered size (in bytes) that triggers an automatic sync.
    /// Zero disables automatic syncs.
    pub memtable_size_limit: usize,

    /// Number of values read from disk kept in memory for repeated reads.
    /// Zero disables the read cache.
    pub read_cache_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./reconkv_data"),
            memtable_size_limit: 64 * 1024 * 1024, // 64 MB
            read_cache_capacity: 1024,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all partitions)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    /// Set how many disk reads are cached
    pub fn read_cache_capacity(mut self, capacity: usize) -> Self {
        self.config.read_cache_capacity = capacity;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
