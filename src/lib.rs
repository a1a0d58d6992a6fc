//! # sndo
//!
//! Persistent storage core of an embedded database:
//! - Append-only heap file of self-describing, typed blocks
//! - Fixed-size chunks mapped on demand under a bounded working set
//! - Corruption-tolerant forward traversal for salvage
//! - Packed records with a variable-width offset table
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐  bufsize()   ┌──────────────────────────────┐
//! │  MemRecord   │─────────────▶│           Mmfile             │
//! │  (builder)   │  alloc()     │  alloc / view / blocks       │
//! └──────┬───────┘◀─────────────│  force / close               │
//!        │ store()   address    └──────────────┬───────────────┘
//!        ▼                                     │ chunk table
//! ┌──────────────┐   view()     ┌──────────────▼───────────────┐
//! │ PackedRecord │◀─────────────│  Chunk 0 │ Chunk 1 │ ...     │
//! │   (reader)   │              │  (memmap2, clock eviction)   │
//! └──────────────┘              └──────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use sndo::{BlockType, MemRecord, Mmfile, PackedRecord};
//!
//! let file = Mmfile::open("data.sndo", true)?;
//! let record: MemRecord = [&b"id-42"[..], b"alice"].into_iter().collect();
//! let address = record.store_to(&file, BlockType::new(1).unwrap())?;
//!
//! let view = file.view(address)?;
//! let stored = PackedRecord::parse(&view)?;
//! assert_eq!(stored.get(1), b"alice");
//! file.force()?;
//! # Ok::<(), sndo::SndoError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod block;
pub mod mmfile;
pub mod record;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use block::{align_up, BlockType};
pub use config::Config;
pub use error::{Result, SndoError};
pub use mmfile::{BlockView, Blocks, Check, Mmfile, MmfileStats, ScanReport};
pub use record::{bufsize, MemRecord, PackedRecord, RecordWriter, Width};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of sndo
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
