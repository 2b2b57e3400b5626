//! Error types for ReconKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using ReconError
pub type Result<T> = std::result::Result<T, ReconError>;

/// Unified error type for ReconKV operations
#[derive(Debug, Error)]
pub enum ReconError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    /// Key is absent everywhere that was searched
    #[error("Key not found")]
    NotFound,

    /// Key was found, but its newest value is a tombstone.
    ///
    /// Lookups across partitions stop on this instead of trying older ones.
    #[error("Key was removed")]
    Removed,

    // -------------------------------------------------------------------------
    // Partition Errors
    // -------------------------------------------------------------------------
    #[error("Attempt to modify read-only partition {0}")]
    ReadOnlyModification(i64),

    #[error("Partition {0} is closed")]
    PartitionClosed(i64),

    #[error("Invalid partition file name: {0}")]
    InvalidPartitionName(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for ReconError {
    fn from(e: bincode::Error) -> Self {
        ReconError::Serialization(e.to_string())
    }
}
