//! Configuration for sndo
//!
//! Centralized configuration with sensible defaults.

use crate::block::{ALIGNMENT, BLOCK_OVERHEAD};
use crate::error::{Result, SndoError};

/// Default chunk size: 4 MiB
pub const DEFAULT_CHUNK_SIZE: u64 = 4 * 1024 * 1024;

/// Largest chunk whose blocks still have lengths that fit a u32: 4 GiB
pub const MAX_CHUNK_SIZE: u64 = u32::MAX as u64 + 1;

/// Default working-set bound (chunks mapped at once)
pub const DEFAULT_MAX_CHUNKS_MAPPED: usize = 256;

/// Largest database the 4-byte persisted size field can describe: 16 GiB
pub const MAX_DB_SIZE: u64 = 16 * 1024 * 1024 * 1024;

/// Default number of attempts to map a chunk before giving up
pub const DEFAULT_MAP_RETRIES: u32 = 3;

/// Main configuration for an Mmfile instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Layout Configuration
    // -------------------------------------------------------------------------
    /// Size of one mapped window of the file (in bytes)
    /// Every block lies entirely inside one chunk.
    pub chunk_size: u64,

    /// Upper bound on the file size (in bytes)
    pub max_db_size: u64,

    // -------------------------------------------------------------------------
    // Mapping Configuration
    // -------------------------------------------------------------------------
    /// Max chunks mapped simultaneously before eviction kicks in.
    /// Lower it when several databases share one process.
    pub max_chunks_mapped: usize,

    /// Attempts to map a chunk (each retry evicts first)
    pub map_retries: u32,

    // -------------------------------------------------------------------------
    // Open Configuration
    // -------------------------------------------------------------------------
    /// Create and initialize the file if it does not exist
    pub create: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_db_size: MAX_DB_SIZE,
            max_chunks_mapped: DEFAULT_MAX_CHUNKS_MAPPED,
            map_retries: DEFAULT_MAP_RETRIES,
            create: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the invariants the file layout depends on
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size % ALIGNMENT != 0 || self.chunk_size < 2 * BLOCK_OVERHEAD {
            return Err(SndoError::Config(format!(
                "chunk_size must be a multiple of {} and at least {}, got {}",
                ALIGNMENT,
                2 * BLOCK_OVERHEAD,
                self.chunk_size
            )));
        }

        // Block lengths are stored as u32
        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(SndoError::Config(format!(
                "chunk_size must be at most {}, got {}",
                MAX_CHUNK_SIZE, self.chunk_size
            )));
        }

        if self.max_db_size % ALIGNMENT != 0 || self.max_db_size > MAX_DB_SIZE {
            return Err(SndoError::Config(format!(
                "max_db_size must be a multiple of {} and at most {}, got {}",
                ALIGNMENT, MAX_DB_SIZE, self.max_db_size
            )));
        }

        if self.chunk_size > self.max_db_size {
            return Err(SndoError::Config(format!(
                "chunk_size {} exceeds max_db_size {}",
                self.chunk_size, self.max_db_size
            )));
        }

        if self.max_chunks_mapped == 0 {
            return Err(SndoError::Config(
                "max_chunks_mapped must be at least 1".to_string(),
            ));
        }

        if self.map_retries == 0 {
            return Err(SndoError::Config(
                "map_retries must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the chunk size (in bytes)
    pub fn chunk_size(mut self, size: u64) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the maximum database size (in bytes)
    pub fn max_db_size(mut self, size: u64) -> Self {
        self.config.max_db_size = size;
        self
    }

    /// Set the number of chunks that may be mapped at once
    pub fn max_chunks_mapped(mut self, count: usize) -> Self {
        self.config.max_chunks_mapped = count;
        self
    }

    /// Set the number of attempts to map a chunk
    pub fn map_retries(mut self, attempts: u32) -> Self {
        self.config.map_retries = attempts;
        self
    }

    /// Create the file on open if it is missing
    pub fn create(mut self, create: bool) -> Self {
        self.config.create = create;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
