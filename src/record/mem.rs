//! MemRecord
//!
//! Collects fields before the destination size is known, then replays
//! them into a packed record.

use bytes::Bytes;

use crate::block::BlockType;
use crate::error::{Result, SndoError};
use crate::mmfile::Mmfile;

use super::{bufsize, PackedRecord, RecordWriter, MAX_FIELDS};

/// Growable, unsized record under construction
///
/// Typical flow: `add` fields, ask for `bufsize()`, allocate that many bytes
/// (usually a block from an `Mmfile`), then `store` into it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemRecord {
    fields: Vec<Bytes>,
    /// Sum of field lengths
    data_size: usize,
}

impl MemRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(fields: usize) -> Self {
        Self {
            fields: Vec::with_capacity(fields),
            data_size: 0,
        }
    }

    /// Append a field
    pub fn add(&mut self, field: impl Into<Bytes>) {
        let field = field.into();
        self.data_size += field.len();
        self.fields.push(field);
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field `i`, empty if absent
    pub fn get(&self, i: usize) -> &[u8] {
        self.fields.get(i).map(|f| &f[..]).unwrap_or(&[])
    }

    pub fn data_size(&self) -> usize {
        self.data_size
    }

    /// Bytes needed to store this record packed
    pub fn bufsize(&self) -> usize {
        bufsize(self.fields.len(), self.data_size)
    }

    /// Replay the fields into `buf` as a packed record
    ///
    /// `buf` should be exactly `bufsize()` bytes.
    pub fn store<'a>(&self, buf: &'a mut [u8]) -> Result<PackedRecord<'a>> {
        let mut writer = RecordWriter::new(buf)?;
        for field in &self.fields {
            writer.add(field)?;
        }
        Ok(writer.seal())
    }

    /// Allocate a block of `block_type` in `file` and store the record there
    ///
    /// Returns the block address; read it back with
    /// `PackedRecord::parse(&file.view(address)?)`.
    pub fn store_to(&self, file: &Mmfile, block_type: BlockType) -> Result<u64> {
        // The block is published even if `store` fails inside the closure,
        // so reject unstorable records before allocating.
        self.check_storable()?;

        let mut stored = Ok(());
        let address = file.alloc_with(self.bufsize(), block_type, |buf| {
            stored = self.store(buf).map(|_| ());
        })?;
        stored?;
        Ok(address)
    }

    /// Whether `store` into a `bufsize()` buffer can succeed
    fn check_storable(&self) -> Result<()> {
        if self.fields.len() > MAX_FIELDS {
            return Err(SndoError::InvalidRecord(format!(
                "{} fields exceeds the limit of {}",
                self.fields.len(),
                MAX_FIELDS
            )));
        }

        let size = self.bufsize();
        if size > u32::MAX as usize {
            return Err(SndoError::InvalidRecord(format!(
                "{} bytes is too large for a record",
                size
            )));
        }

        Ok(())
    }
}

impl<B: Into<Bytes>> FromIterator<B> for MemRecord {
    fn from_iter<I: IntoIterator<Item = B>>(iter: I) -> Self {
        let mut record = MemRecord::new();
        for field in iter {
            record.add(field);
        }
        record
    }
}

impl From<PackedRecord<'_>> for MemRecord {
    fn from(record: PackedRecord<'_>) -> Self {
        record.iter().map(Bytes::copy_from_slice).collect()
    }
}
