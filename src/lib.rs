//! # ReconKV
//!
//! An embedded, single-process key-value storage engine with:
//! - An in-memory write buffer that shadows the on-disk data
//! - Immutable, append-only on-disk partitions named by creation time
//! - Newest-first lookups across partitions with tombstone deletes
//! - Compaction that merges every partition into one
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        MemTable                              │
//! │        get / set / del / scan / sync / compact               │
//! │              (one Mutex guards everything below)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ miss / sync
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                   PartitionedLog                             │
//! │     opened partitions  +  available (on-disk) partitions     │
//! │                 searched newest → oldest                     │
//! └──────────┬───────────────────┬───────────────────┬──────────┘
//!            ▼                   ▼                   ▼
//!   ┌────────────────┐  ┌────────────────┐  ┌────────────────┐
//!   │ T3 (writable)  │  │ T2 (read-only) │  │ T1 (read-only) │
//!   │ partition+index│  │ partition+index│  │ partition+index│
//!   └────────────────┘  └────────────────┘  └────────────────┘
//!            ▲
//!            │ merge_sort: T1..T3 → T4
//!   ┌────────┴───────┐
//!   │   Compaction   │
//!   └────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod storage;
pub mod memtable;
pub mod compaction;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ReconError, Result};
pub use config::Config;
pub use memtable::MemTable;
pub use storage::{DiskStore, MemoryStore, PartitionedLog, TOMBSTONE};
pub use compaction::{merge_sort, CompactionResult};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of ReconKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
