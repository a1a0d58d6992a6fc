//! Block Codec
//!
//! Pure encode/decode of the file header and of block headers/trailers.
//! Nothing here touches the file; `mmfile` does the I/O.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ File Header (8 bytes)                                   │
//! │   Magic: "Sndo" (4) | FileSize >> 2: u32 (4)            │
//! ├─────────────────────────────────────────────────────────┤
//! │ Block                                                   │
//! │   [Len | Type: u32][Payload: Len bytes][Len ^ End: u32] │
//! │   ... repeated until FileSize ...                       │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! `Len` is always a multiple of 8, so its low 3 bits carry the block type.
//! `End` is the address just past the payload (where the trailer sits),
//! truncated to 32 bits. The check is positional, not a checksum.

use crate::error::{Result, SndoError};

// =============================================================================
// Layout Constants
// =============================================================================

/// Magic bytes identifying a sndo heap file
pub const MAGIC: &[u8; 4] = b"Sndo";

/// File header size: Magic (4) + FileSize (4) = 8 bytes
pub const FILE_HEADER_SIZE: u64 = 8;

/// Block lengths and file sizes are multiples of this
pub const ALIGNMENT: u64 = 8;

/// Block header: Len | Type (4)
pub const BLOCK_HEADER_SIZE: u64 = 4;

/// Block trailer: Len ^ End (4)
pub const BLOCK_TRAILER_SIZE: u64 = 4;

/// Header + trailer bytes added to every payload
pub const BLOCK_OVERHEAD: u64 = BLOCK_HEADER_SIZE + BLOCK_TRAILER_SIZE;

/// Largest aligned file size the persisted `size >> 2` field can record
pub const MAX_PERSISTED_SIZE: u64 = ((u32::MAX as u64) << 2) & !(ALIGNMENT - 1);

/// Low bits of the header word holding the type
const TYPE_MASK: u32 = (ALIGNMENT as u32) - 1;

// =============================================================================
// Block Type
// =============================================================================

/// 3-bit block type tag (0..=7)
///
/// Type 0 is reserved for filler blocks that pad a chunk's tail; the
/// allocator writes them itself and iteration never returns them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockType(u8);

impl BlockType {
    /// Padding block, internal to the allocator
    pub const FILLER: BlockType = BlockType(0);

    /// Largest representable type
    pub const MAX: u8 = TYPE_MASK as u8;

    /// Returns `None` if `tag` does not fit in 3 bits
    pub const fn new(tag: u8) -> Option<Self> {
        if tag <= Self::MAX {
            Some(Self(tag))
        } else {
            None
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    pub const fn is_filler(self) -> bool {
        self.0 == 0
    }
}

impl TryFrom<u8> for BlockType {
    type Error = SndoError;

    fn try_from(tag: u8) -> Result<Self> {
        Self::new(tag).ok_or_else(|| {
            SndoError::Config(format!("block type {} out of range 0..={}", tag, Self::MAX))
        })
    }
}

// =============================================================================
// Codec Functions
// =============================================================================

/// Round `n` up to the next multiple of [`ALIGNMENT`]
#[inline]
pub const fn align_up(n: u64) -> u64 {
    (n + (ALIGNMENT - 1)) & !(ALIGNMENT - 1)
}

/// Pack an aligned length and a type into a header word
#[inline]
pub fn encode_header(len: u32, block_type: BlockType) -> [u8; 4] {
    debug_assert_eq!(len & TYPE_MASK, 0, "block length must be aligned");
    (len | block_type.0 as u32).to_le_bytes()
}

/// Split a header word into (length, type)
#[inline]
pub fn decode_header(raw: [u8; 4]) -> (u32, BlockType) {
    let word = u32::from_le_bytes(raw);
    (word & !TYPE_MASK, BlockType((word & TYPE_MASK) as u8))
}

/// Trailer word for `len` payload bytes whose payload ends at `end`
#[inline]
pub fn trailer(len: u32, end: u64) -> u32 {
    len ^ (end as u32)
}

#[inline]
pub fn encode_trailer(len: u32, end: u64) -> [u8; 4] {
    trailer(len, end).to_le_bytes()
}

/// Does the stored trailer agree with the header length and position?
#[inline]
pub fn trailer_matches(raw: [u8; 4], len: u32, end: u64) -> bool {
    u32::from_le_bytes(raw) == trailer(len, end)
}

/// Encode the 8-byte file header for a file of `size` bytes
pub fn encode_file_header(size: u64) -> [u8; 8] {
    debug_assert_eq!(size % ALIGNMENT, 0);
    let mut out = [0u8; 8];
    out[0..4].copy_from_slice(MAGIC);
    out[4..8].copy_from_slice(&((size >> 2) as u32).to_le_bytes());
    out
}

/// Decode the file header, returning the persisted file size
///
/// Only the magic is checked here; size bounds are checked by the opener,
/// which knows the actual file length and configured limits.
pub fn decode_file_header(raw: &[u8; 8]) -> Result<u64> {
    if &raw[0..4] != MAGIC {
        return Err(SndoError::InvalidFile(format!(
            "bad magic: expected {:?}, got {:?}",
            MAGIC,
            &raw[0..4]
        )));
    }

    let stored = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
    Ok((stored as u64) << 2)
}
