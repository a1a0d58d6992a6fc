//! Block Iterator
//!
//! Forward traversal over every block in the file, stopping at the first
//! corrupt one.

use tracing::warn;

use crate::block::{BlockType, BLOCK_OVERHEAD, FILE_HEADER_SIZE};
use crate::error::{Result, SndoError};

use super::file::Mmfile;
use super::view::BlockView;

/// Outcome of validating the block at one position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// Header and trailer agree; `len` is the payload length
    Valid { len: u32, block_type: BlockType },
    /// Bad trailer, impossible length, or block past the file size
    Corrupt { reason: &'static str },
    /// Position is at or past the recorded file size
    Eof,
}

/// Summary of a full-file scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Non-filler blocks found before the end (or the corruption)
    pub blocks: u64,
    /// Filler blocks skipped
    pub filler_blocks: u64,
    /// Payload bytes in non-filler blocks
    pub bytes: u64,
    /// Header address of the first corrupt block, if any
    pub corrupt_at: Option<u64>,
}

impl ScanReport {
    pub fn is_clean(&self) -> bool {
        self.corrupt_at.is_none()
    }
}

/// Iterator over the file's blocks in address order
///
/// Filler blocks are skipped. On corruption the iterator yields one
/// `Err(SndoError::Corruption { .. })` and then ends, so everything before
/// the damage can still be salvaged:
///
/// ```no_run
/// # use sndo::{Mmfile, SndoError};
/// # let file = Mmfile::open("db.sndo", false)?;
/// for block in file.blocks() {
///     match block {
///         Ok(view) => { /* use view */ }
///         Err(SndoError::Corruption { address, .. }) => {
///             eprintln!("stopped at {address}");
///         }
///         Err(e) => return Err(e),
///     }
/// }
/// # Ok::<(), SndoError>(())
/// ```
pub struct Blocks<'a> {
    file: &'a Mmfile,
    /// Header address of the next block
    pos: u64,
    /// Stop here (file size when the iterator was created or reset)
    end: u64,
    corrupt: bool,
}

impl<'a> Blocks<'a> {
    pub(super) fn new(file: &'a Mmfile) -> Self {
        Self {
            file,
            pos: FILE_HEADER_SIZE,
            end: file.file_size(),
            corrupt: false,
        }
    }

    /// Did traversal stop at a corrupt block?
    pub fn is_corrupt(&self) -> bool {
        self.corrupt
    }

    /// Start over from the first block, picking up blocks appended since
    pub fn reset(&mut self) {
        self.pos = FILE_HEADER_SIZE;
        self.end = self.file.file_size();
        self.corrupt = false;
    }
}

impl<'a> Iterator for Blocks<'a> {
    type Item = Result<BlockView>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.pos >= self.end {
                return None;
            }

            let pos = self.pos;
            let check = match self.file.check_within(pos, self.end) {
                Ok(check) => check,
                Err(e) => {
                    self.pos = self.end;
                    return Some(Err(e));
                }
            };

            match check {
                Check::Valid { len, block_type } => {
                    self.pos = pos + len as u64 + BLOCK_OVERHEAD;
                    if block_type.is_filler() {
                        continue;
                    }
                    return Some(self.file.block_at(pos, len, block_type));
                }
                Check::Corrupt { reason } => {
                    warn!(address = pos, reason, "corrupt block, ending traversal");
                    self.corrupt = true;
                    self.pos = self.end;
                    return Some(Err(SndoError::Corruption {
                        address: pos,
                        reason,
                    }));
                }
                Check::Eof => {
                    self.pos = self.end;
                    return None;
                }
            }
        }
    }
}

impl std::iter::FusedIterator for Blocks<'_> {}
