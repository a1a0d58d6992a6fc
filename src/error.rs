//! Error types for sndo
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using SndoError
pub type Result<T> = std::result::Result<T, SndoError>;

/// Unified error type for sndo operations
#[derive(Debug, Error)]
pub enum SndoError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to map chunk {chunk} after {attempts} attempts: {source}")]
    MapFailed {
        chunk: u64,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // File Errors
    // -------------------------------------------------------------------------
    #[error("not a valid database file: {0}")]
    InvalidFile(String),

    #[error("database full: {requested} bytes requested at size {file_size} (max {max})")]
    DatabaseFull {
        requested: u64,
        file_size: u64,
        max: u64,
    },

    #[error("invalid block address: {0}")]
    InvalidAddress(u64),

    #[error("corrupt block at {address}: {reason}")]
    Corruption { address: u64, reason: &'static str },

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("record overflow: field of {needed} bytes, {available} bytes left")]
    RecordOverflow { needed: usize, available: usize },

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
