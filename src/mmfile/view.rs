//! Block views
//!
//! Read-only windows onto a block's payload inside a mapped chunk.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::block::BlockType;

use super::chunk::Chunk;

/// Payload of one block, borrowed from its chunk mapping
///
/// Holds a reference to the chunk, so the mapping outlives eviction for as
/// long as the view is alive. Cloning is cheap.
#[derive(Clone)]
pub struct BlockView {
    chunk: Arc<Chunk>,
    /// Payload offset inside the chunk
    offset: usize,
    len: usize,
    address: u64,
    block_type: BlockType,
}

impl BlockView {
    pub(super) fn new(
        chunk: Arc<Chunk>,
        offset: usize,
        len: usize,
        address: u64,
        block_type: BlockType,
    ) -> Self {
        Self {
            chunk,
            offset,
            len,
            address,
            block_type,
        }
    }

    /// File address of the payload (what `alloc` returned)
    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn block_type(&self) -> BlockType {
        self.block_type
    }

    /// Aligned payload length from the block header
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.chunk.bytes(self.offset, self.len)
    }
}

impl Deref for BlockView {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for BlockView {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for BlockView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockView")
            .field("address", &self.address)
            .field("block_type", &self.block_type)
            .field("len", &self.len)
            .finish()
    }
}
