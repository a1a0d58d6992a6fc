//! Chunk mappings and the mapped-chunk table
//!
//! A chunk is one `chunk_size` window of the file. The table keeps at most
//! `max_mapped` of them mapped and picks eviction victims with a
//! second-chance clock.

use std::fs::File;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use memmap2::{MmapOptions, MmapRaw};

// =============================================================================
// Chunk
// =============================================================================

/// One mapped window of the backing file
///
/// Dropping the last `Arc<Chunk>` unmaps it. The table holds one reference;
/// every outstanding `BlockView` holds another, so eviction never pulls
/// memory out from under a reader.
pub(crate) struct Chunk {
    index: u64,
    map: MmapRaw,
}

impl Chunk {
    /// Map chunk `index`, growing the file to cover it if needed
    pub(super) fn map(file: &File, index: u64, chunk_size: u64) -> io::Result<Self> {
        let start = index * chunk_size;
        let end = start + chunk_size;

        if file.metadata()?.len() < end {
            file.set_len(end)?;
        }

        let map = MmapOptions::new()
            .offset(start)
            .len(chunk_size as usize)
            .map_raw(file)?;

        Ok(Self { index, map })
    }

    pub(super) fn index(&self) -> u64 {
        self.index
    }

    pub(super) fn len(&self) -> usize {
        self.map.len()
    }

    /// Borrow `len` bytes at `offset`
    ///
    /// Only published bytes (below the file size) are read through here, and
    /// published bytes are never written again.
    pub(super) fn bytes(&self, offset: usize, len: usize) -> &[u8] {
        assert!(offset + len <= self.len(), "range outside chunk");
        // SAFETY: in bounds of a live mapping; the range is immutable once published.
        unsafe { std::slice::from_raw_parts(self.map.as_ptr().add(offset), len) }
    }

    pub(super) fn read_u32(&self, offset: usize) -> [u8; 4] {
        let mut out = [0u8; 4];
        out.copy_from_slice(self.bytes(offset, 4));
        out
    }

    /// Mutable access to an unpublished range
    ///
    /// # Safety
    /// The caller must hold the allocation lock and the range must lie at or
    /// past the published file size (or inside the file header), so no
    /// other reference to it exists.
    #[allow(clippy::mut_from_ref)]
    pub(super) unsafe fn bytes_mut(&self, offset: usize, len: usize) -> &mut [u8] {
        assert!(offset + len <= self.len(), "range outside chunk");
        std::slice::from_raw_parts_mut(self.map.as_mut_ptr().add(offset), len)
    }

    /// Synchronously write dirty pages back to the file
    pub(super) fn flush(&self) -> io::Result<()> {
        self.map.flush()
    }
}

// =============================================================================
// Chunk Table
// =============================================================================

#[derive(Default)]
struct Slot {
    chunk: Option<Arc<Chunk>>,
    /// Second-chance bit, set on every access
    used: AtomicBool,
}

/// Mapped chunks indexed by chunk number
///
/// ## Concurrency:
/// - Lookups need only `&self` (shared lock in `Mmfile`); the used bit is atomic
/// - Insert/evict need `&mut self` (exclusive lock)
pub(crate) struct ChunkTable {
    slots: Vec<Slot>,
    /// Number of slots holding a mapping
    mapped: usize,
    /// Clock hand for eviction
    hand: usize,
    max_mapped: usize,
}

impl ChunkTable {
    pub(super) fn new(max_mapped: usize) -> Self {
        Self {
            slots: Vec::new(),
            mapped: 0,
            hand: 0,
            max_mapped,
        }
    }

    /// Look up a mapped chunk and mark it recently used
    pub(super) fn get(&self, index: u64) -> Option<Arc<Chunk>> {
        let slot = self.slots.get(index as usize)?;
        let chunk = slot.chunk.as_ref()?;
        slot.used.store(true, Ordering::Relaxed);
        Some(Arc::clone(chunk))
    }

    pub(super) fn is_full(&self) -> bool {
        self.mapped >= self.max_mapped
    }

    pub(super) fn mapped_count(&self) -> usize {
        self.mapped
    }

    /// Record a fresh mapping (marked used)
    pub(super) fn insert(&mut self, chunk: Arc<Chunk>) {
        let index = chunk.index() as usize;
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, Slot::default);
        }

        let slot = &mut self.slots[index];
        debug_assert!(slot.chunk.is_none(), "chunk {} mapped twice", index);
        slot.chunk = Some(chunk);
        *slot.used.get_mut() = true;
        self.mapped += 1;
    }

    /// Drop one mapping chosen by the second-chance clock
    ///
    /// Sweeps at most two full turns: the first clears used bits, so a
    /// victim is always found by the second if anything is mapped.
    pub(super) fn evict_one(&mut self) -> Option<Arc<Chunk>> {
        let len = self.slots.len();
        if self.mapped == 0 || len == 0 {
            return None;
        }

        for _ in 0..2 * len {
            let pos = self.hand % len;
            self.hand = (pos + 1) % len;

            let slot = &mut self.slots[pos];
            if slot.chunk.is_none() {
                continue;
            }

            if std::mem::replace(slot.used.get_mut(), false) {
                continue;
            }

            self.mapped -= 1;
            let victim = slot.chunk.take();
            if let Some(chunk) = &victim {
                tracing::trace!(chunk = chunk.index(), "evicted chunk");
            }
            return victim;
        }

        None
    }

    /// All currently mapped chunks
    pub(super) fn mapped(&self) -> impl Iterator<Item = &Arc<Chunk>> {
        self.slots.iter().filter_map(|slot| slot.chunk.as_ref())
    }

    /// Drop every mapping
    pub(super) fn clear(&mut self) {
        self.slots.clear();
        self.mapped = 0;
        self.hand = 0;
    }
}
