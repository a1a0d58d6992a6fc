//! Chunked Mapped File Module
//!
//! Append-only heap file accessed through fixed-size mapped windows.
//!
//! ## Responsibilities
//! - Validate or initialize the file header on open
//! - Append blocks, padding chunk tails with filler blocks
//! - Map chunks lazily under a bounded working set (second-chance eviction)
//! - Random access to block payloads by address
//! - Forward traversal that stops cleanly at the first corrupt block
//!
//! ## Chunk Layout
//! ```text
//! chunk 0                              chunk 1
//! ┌────────┬───────┬───────┬────────┐  ┌───────┬───────┬─────
//! │ header │ block │ block │ filler │  │ block │ block │ ...
//! └────────┴───────┴───────┴────────┘  └───────┴───────┴─────
//! ```
//! No block crosses a chunk boundary.

mod chunk;
mod file;
mod iterator;
mod view;

pub use file::{Mmfile, MmfileStats};
pub use iterator::{Blocks, Check, ScanReport};
pub use view::BlockView;
