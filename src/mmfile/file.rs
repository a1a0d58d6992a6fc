//! Mmfile
//!
//! Owns the backing file, appends blocks and hands out views.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, trace, warn};

use crate::block::{
    align_up, decode_file_header, decode_header, encode_file_header, encode_header,
    encode_trailer, trailer_matches, BlockType, ALIGNMENT, BLOCK_HEADER_SIZE, BLOCK_OVERHEAD,
    FILE_HEADER_SIZE, MAX_PERSISTED_SIZE,
};
use crate::config::Config;
use crate::error::{Result, SndoError};

use super::chunk::{Chunk, ChunkTable};
use super::iterator::{Blocks, Check, ScanReport};
use super::view::BlockView;

/// Allocation state, only touched under the allocation lock
struct AllocState {
    /// Logical end of the file: next block starts here
    file_size: u64,
}

/// Snapshot of an Mmfile's size and working set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmfileStats {
    /// Logical file size in bytes
    pub file_size: u64,
    /// Chunks currently held in the chunk table
    pub mapped_chunks: usize,
    /// Chunks spanned by the logical file size
    pub chunk_count: u64,
}

/// Append-only heap file accessed through mapped chunks
///
/// ## Concurrency:
/// - `state`: Mutex serializing allocation (single writer at a time)
/// - `chunks`: RwLock; `view()` on a mapped chunk takes the shared side,
///   mapping and eviction take the exclusive side
/// - `published`: file size visible to readers, advanced only after a block
///   is fully written
///
/// Lock order is always `state` then `chunks`.
pub struct Mmfile {
    path: PathBuf,
    config: Config,
    file: File,
    state: Mutex<AllocState>,
    chunks: RwLock<ChunkTable>,
    published: AtomicU64,
}

impl Mmfile {
    /// Open (or create) a file with default configuration
    pub fn open(path: impl AsRef<Path>, create: bool) -> Result<Self> {
        let config = Config {
            create,
            ..Config::default()
        };
        Self::open_with(path, &config)
    }

    /// Open a file with an explicit configuration
    ///
    /// On open:
    /// 1. Open the file, creating it if allowed
    /// 2. Empty file: write a fresh header
    /// 3. Otherwise validate magic and persisted size
    pub fn open_with(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(config.create)
            .open(&path)?;

        let actual = file.metadata()?.len();

        let file_size = if actual == 0 {
            if !config.create {
                return Err(SndoError::InvalidFile("file is empty".to_string()));
            }
            file.write_all(&encode_file_header(FILE_HEADER_SIZE))?;
            info!(path = %path.display(), "created database file");
            FILE_HEADER_SIZE
        } else {
            let size = Self::read_header(&mut file, actual, config)?;
            info!(path = %path.display(), file_size = size, "opened database file");
            size
        };

        Ok(Self {
            path,
            config: config.clone(),
            file,
            state: Mutex::new(AllocState { file_size }),
            chunks: RwLock::new(ChunkTable::new(config.max_chunks_mapped)),
            published: AtomicU64::new(file_size),
        })
    }

    /// Read and validate the file header, returning the persisted size
    fn read_header(file: &mut File, actual: u64, config: &Config) -> Result<u64> {
        if actual < FILE_HEADER_SIZE {
            return Err(SndoError::InvalidFile(format!(
                "file too short for header: {} bytes",
                actual
            )));
        }

        let mut header = [0u8; FILE_HEADER_SIZE as usize];
        file.read_exact(&mut header)?;
        let size = decode_file_header(&header)?;

        if size < FILE_HEADER_SIZE {
            return Err(SndoError::InvalidFile(format!("size {} below header", size)));
        }
        if size > actual {
            return Err(SndoError::InvalidFile(format!(
                "recorded size {} exceeds actual size {}",
                size, actual
            )));
        }
        if size % ALIGNMENT != 0 {
            return Err(SndoError::InvalidFile(format!("size {} misaligned", size)));
        }
        if size > config.max_db_size {
            return Err(SndoError::InvalidFile(format!(
                "size {} exceeds maximum {}",
                size, config.max_db_size
            )));
        }

        Ok(size)
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Allocate a zero-filled block of `n` payload bytes
    ///
    /// Returns the payload address. See [`Mmfile::alloc_with`] for panics.
    pub fn alloc(&self, n: usize, block_type: BlockType) -> Result<u64> {
        self.alloc_with(n, block_type, |_| {})
    }

    /// Allocate a block and copy `data` into it
    pub fn append(&self, block_type: BlockType, data: &[u8]) -> Result<u64> {
        self.alloc_with(data.len(), block_type, |buf| buf.copy_from_slice(data))
    }

    /// Allocate a block of `n` payload bytes and fill it before publishing
    ///
    /// `fill` receives exactly `n` zeroed bytes. If the current chunk cannot
    /// hold the block, a filler block pads it out to the chunk boundary first.
    ///
    /// # Panics
    /// - `block_type` is [`BlockType::FILLER`]
    /// - the aligned block (payload + 8 bytes overhead) is larger than a chunk
    pub fn alloc_with<F>(&self, n: usize, block_type: BlockType, fill: F) -> Result<u64>
    where
        F: FnOnce(&mut [u8]),
    {
        assert!(
            !block_type.is_filler(),
            "filler type is reserved for chunk padding"
        );

        let chunk_size = self.config.chunk_size;
        let len = align_up(n as u64);
        assert!(
            len + BLOCK_OVERHEAD <= chunk_size,
            "block of {} bytes does not fit a {}-byte chunk",
            n,
            chunk_size
        );

        let mut state = self.state.lock();
        let mut pos = state.file_size;

        // Step 1: Pad to the next chunk if this one is too full
        let room = chunk_size - pos % chunk_size;
        let pad = if room < len + BLOCK_OVERHEAD { room } else { 0 };

        let end = pos + pad + len + BLOCK_OVERHEAD;
        let max = self.config.max_db_size.min(MAX_PERSISTED_SIZE);
        if end > max {
            return Err(SndoError::DatabaseFull {
                requested: len + BLOCK_OVERHEAD,
                file_size: pos,
                max,
            });
        }

        if pad > 0 {
            trace!(address = pos, pad, "padding chunk tail with filler");
            self.write_block(pos, pad - BLOCK_OVERHEAD, BlockType::FILLER, |_| {})?;
            pos += pad;
        }

        assert!(
            chunk_size - pos % chunk_size >= len + BLOCK_OVERHEAD,
            "no room for block at {} after padding",
            pos
        );

        // Step 2: Write header, payload and trailer
        let address = self.write_block(pos, len, block_type, |payload| fill(&mut payload[..n]))?;

        // Step 3: Persist and publish the new size; on failure the cursor stays
        // put and the next allocation overwrites this block
        self.persist_size(end)?;
        state.file_size = end;
        self.published.store(end, Ordering::Release);

        Ok(address)
    }

    /// Write one complete block starting at `pos`, returning its payload address
    fn write_block<F>(&self, pos: u64, len: u64, block_type: BlockType, fill: F) -> Result<u64>
    where
        F: FnOnce(&mut [u8]),
    {
        let chunk_size = self.config.chunk_size;
        let chunk = self.chunk(pos / chunk_size)?;
        let offset = (pos % chunk_size) as usize;
        let payload_end = pos + BLOCK_HEADER_SIZE + len;

        // SAFETY: allocation lock is held and the block range is past the published size.
        let block = unsafe { chunk.bytes_mut(offset, (len + BLOCK_OVERHEAD) as usize) };
        let (header, rest) = block.split_at_mut(BLOCK_HEADER_SIZE as usize);
        let (payload, trailer) = rest.split_at_mut(len as usize);

        header.copy_from_slice(&encode_header(len as u32, block_type));
        payload.fill(0);
        fill(payload);
        trailer.copy_from_slice(&encode_trailer(len as u32, payload_end));

        Ok(pos + BLOCK_HEADER_SIZE)
    }

    /// Store the file size in the header
    fn persist_size(&self, size: u64) -> Result<()> {
        let chunk = self.chunk(0)?;
        let header = encode_file_header(size);
        // SAFETY: allocation lock is held; the header is never handed out in a view.
        let field = unsafe { chunk.bytes_mut(4, 4) };
        field.copy_from_slice(&header[4..8]);
        Ok(())
    }

    // =========================================================================
    // Access
    // =========================================================================

    /// View the payload of the block whose payload starts at `address`
    ///
    /// The window is bounded by the length in the block header.
    pub fn view(&self, address: u64) -> Result<BlockView> {
        let published = self.published.load(Ordering::Acquire);
        if address < FILE_HEADER_SIZE + BLOCK_HEADER_SIZE || address >= published {
            return Err(SndoError::InvalidAddress(address));
        }

        let chunk_size = self.config.chunk_size;
        let start = address - BLOCK_HEADER_SIZE;
        let offset = start % chunk_size;
        if offset + BLOCK_OVERHEAD > chunk_size {
            return Err(SndoError::InvalidAddress(address));
        }

        let chunk = self.chunk(start / chunk_size)?;
        let (len, block_type) = decode_header(chunk.read_u32(offset as usize));
        let len = len as u64;

        if offset + len + BLOCK_OVERHEAD > chunk_size || start + len + BLOCK_OVERHEAD > published {
            return Err(SndoError::InvalidAddress(address));
        }

        Ok(BlockView::new(
            chunk,
            (offset + BLOCK_HEADER_SIZE) as usize,
            len as usize,
            address,
            block_type,
        ))
    }

    /// Validate the block whose payload starts at `address`
    ///
    /// Addresses are the ones `alloc` returns; an address whose header would
    /// start at or past the file size is [`Check::Eof`].
    pub fn check(&self, address: u64) -> Result<Check> {
        if address < FILE_HEADER_SIZE + BLOCK_HEADER_SIZE {
            return Err(SndoError::InvalidAddress(address));
        }
        self.check_within(
            address - BLOCK_HEADER_SIZE,
            self.published.load(Ordering::Acquire),
        )
    }

    /// Validate the block at `pos` against an explicit end of file
    pub(super) fn check_within(&self, pos: u64, end: u64) -> Result<Check> {
        if pos >= end {
            return Ok(Check::Eof);
        }
        if pos + BLOCK_OVERHEAD > end {
            return Ok(Check::Corrupt {
                reason: "truncated block",
            });
        }

        let chunk_size = self.config.chunk_size;
        let offset = pos % chunk_size;
        if offset + BLOCK_OVERHEAD > chunk_size {
            return Ok(Check::Corrupt {
                reason: "block header straddles chunk boundary",
            });
        }

        let chunk = self.chunk(pos / chunk_size)?;
        let (len, block_type) = decode_header(chunk.read_u32(offset as usize));
        let total = len as u64 + BLOCK_OVERHEAD;

        if total > chunk_size - offset {
            return Ok(Check::Corrupt {
                reason: "length exceeds chunk",
            });
        }
        if pos + total > end {
            return Ok(Check::Corrupt {
                reason: "block extends past file size",
            });
        }

        let trailer_at = offset + BLOCK_HEADER_SIZE + len as u64;
        let payload_end = pos + BLOCK_HEADER_SIZE + len as u64;
        if !trailer_matches(chunk.read_u32(trailer_at as usize), len, payload_end) {
            return Ok(Check::Corrupt {
                reason: "trailer mismatch",
            });
        }

        Ok(Check::Valid { len, block_type })
    }

    /// View for a block already validated by `check`
    pub(super) fn block_at(&self, pos: u64, len: u32, block_type: BlockType) -> Result<BlockView> {
        let chunk_size = self.config.chunk_size;
        let chunk = self.chunk(pos / chunk_size)?;
        let offset = pos % chunk_size + BLOCK_HEADER_SIZE;
        Ok(BlockView::new(
            chunk,
            offset as usize,
            len as usize,
            pos + BLOCK_HEADER_SIZE,
            block_type,
        ))
    }

    /// Iterate over all non-filler blocks in file order
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks::new(self)
    }

    /// Scan the whole file, stopping at the first corrupt block
    pub fn verify(&self) -> Result<ScanReport> {
        let end = self.published.load(Ordering::Acquire);
        let mut report = ScanReport::default();
        let mut pos = FILE_HEADER_SIZE;

        while pos < end {
            match self.check_within(pos, end)? {
                Check::Valid { len, block_type } => {
                    if block_type.is_filler() {
                        report.filler_blocks += 1;
                    } else {
                        report.blocks += 1;
                        report.bytes += len as u64;
                    }
                    pos += len as u64 + BLOCK_OVERHEAD;
                }
                Check::Corrupt { reason } => {
                    warn!(address = pos, reason, "verify stopped at corrupt block");
                    report.corrupt_at = Some(pos);
                    break;
                }
                Check::Eof => break,
            }
        }

        Ok(report)
    }

    // =========================================================================
    // Chunk Management
    // =========================================================================

    /// Get chunk `index`, mapping it (and evicting another) if needed
    fn chunk(&self, index: u64) -> Result<Arc<Chunk>> {
        // Fast path: already mapped, shared lock only
        if let Some(chunk) = self.chunks.read().get(index) {
            return Ok(chunk);
        }

        let mut table = self.chunks.write();
        // Another thread may have mapped it while we waited
        if let Some(chunk) = table.get(index) {
            return Ok(chunk);
        }

        self.map_chunk(&mut table, index)
    }

    /// Map a chunk into the table with bounded retries
    fn map_chunk(&self, table: &mut ChunkTable, index: u64) -> Result<Arc<Chunk>> {
        if table.is_full() {
            table.evict_one();
        }

        let attempts = self.config.map_retries;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match Chunk::map(&self.file, index, self.config.chunk_size) {
                Ok(chunk) => {
                    debug!(chunk = index, mapped = table.mapped_count() + 1, "mapped chunk");
                    let chunk = Arc::new(chunk);
                    table.insert(Arc::clone(&chunk));
                    return Ok(chunk);
                }
                Err(e) if attempt < attempts => {
                    warn!(chunk = index, attempt, error = %e, "chunk map failed, evicting and retrying");
                    table.evict_one();
                }
                Err(e) => {
                    error!(chunk = index, attempts, error = %e, "giving up mapping chunk");
                    return Err(SndoError::MapFailed {
                        chunk: index,
                        attempts,
                        source: e,
                    });
                }
            }
        }
    }

    // =========================================================================
    // Durability / Lifecycle
    // =========================================================================

    /// Flush every mapped chunk to durable storage
    pub fn force(&self) -> Result<()> {
        // Hold the allocation lock so no block is half-written while flushing
        let _state = self.state.lock();
        let table = self.chunks.read();

        for chunk in table.mapped() {
            chunk.flush()?;
        }
        self.file.sync_all()?;

        debug!(path = %self.path.display(), mapped = table.mapped_count(), "forced mapped chunks");
        Ok(())
    }

    /// Drop all mappings and close the file
    ///
    /// Does not flush (call [`Mmfile::force`] first) and does not truncate:
    /// the file stays rounded up to a chunk boundary.
    pub fn close(self) {
        debug!(path = %self.path.display(), file_size = self.file_size(), "closing");
        drop(self);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Logical file size (end of the last block)
    pub fn file_size(&self) -> u64 {
        self.published.load(Ordering::Acquire)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> MmfileStats {
        let file_size = self.file_size();
        MmfileStats {
            file_size,
            mapped_chunks: self.chunks.read().mapped_count(),
            chunk_count: file_size.div_ceil(self.config.chunk_size),
        }
    }
}

impl Drop for Mmfile {
    fn drop(&mut self) {
        self.chunks.get_mut().clear();
    }
}
