//! Packed record views
//!
//! `RecordWriter` builds a record in place; `PackedRecord` reads one.

use bytes::Bytes;

use crate::error::{Result, SndoError};

use super::{slot_pos, Width, MAX_FIELDS, RECORD_HEADER_SIZE};

// =============================================================================
// Reader
// =============================================================================

/// Read-only view over a packed record
///
/// Fields past `field_count` read as empty rather than failing, so a record
/// written with fewer trailing fields than a reader expects is still valid.
#[derive(Debug, Clone, Copy)]
pub struct PackedRecord<'a> {
    /// Exactly `total_size` bytes
    buf: &'a [u8],
    width: Width,
    count: usize,
}

impl<'a> PackedRecord<'a> {
    /// Parse a record from the front of `buf`
    ///
    /// `buf` may be longer than the record (e.g. an aligned block payload);
    /// the record's own total size bounds the view. The whole offset table
    /// is validated here so field access cannot go out of bounds.
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        if buf.len() < RECORD_HEADER_SIZE {
            return Err(SndoError::InvalidRecord(format!(
                "{} bytes is too short for a record header",
                buf.len()
            )));
        }

        let width = Width::from_tag(buf[0])
            .ok_or_else(|| SndoError::InvalidRecord(format!("unknown width tag {}", buf[0])))?;
        let count = u16::from_le_bytes([buf[1], buf[2]]) as usize;

        let table_end = slot_pos(width, count + 1);
        if table_end > buf.len() {
            return Err(SndoError::InvalidRecord(format!(
                "offset table for {} fields overruns {} bytes",
                count,
                buf.len()
            )));
        }

        let total = width.read(buf, slot_pos(width, 0));
        if total > buf.len() || total < table_end || Width::for_size(total) != width {
            return Err(SndoError::InvalidRecord(format!(
                "total size {} inconsistent with {:?} offsets in {} bytes",
                total,
                width,
                buf.len()
            )));
        }

        let mut prev = total;
        for slot in 1..=count {
            let offset = width.read(buf, slot_pos(width, slot));
            if offset > prev || offset < table_end {
                return Err(SndoError::InvalidRecord(format!(
                    "field {} offset {} out of order",
                    slot - 1,
                    offset
                )));
            }
            prev = offset;
        }

        Ok(Self {
            buf: &buf[..total],
            width,
            count,
        })
    }

    /// Offset where field `i` starts (`i = -1` meaning the total size)
    fn offset(&self, slot: usize) -> usize {
        self.width.read(self.buf, slot_pos(self.width, slot))
    }

    /// Bytes of field `i`, empty if `i >= field_count`
    pub fn get(&self, i: usize) -> &'a [u8] {
        if i >= self.count {
            return &[];
        }
        let start = self.offset(i + 1);
        let end = self.offset(i);
        &self.buf[start..end]
    }

    /// Owned copy of field `i`
    pub fn get_bytes(&self, i: usize) -> Bytes {
        Bytes::copy_from_slice(self.get(i))
    }

    /// Length of field `i`, 0 if absent
    pub fn size(&self, i: usize) -> usize {
        if i >= self.count {
            return 0;
        }
        self.offset(i) - self.offset(i + 1)
    }

    pub fn field_count(&self) -> usize {
        self.count
    }

    pub fn total_size(&self) -> usize {
        self.buf.len()
    }

    pub fn width(&self) -> Width {
        self.width
    }

    /// The record's raw bytes
    pub fn as_bytes(&self) -> &'a [u8] {
        self.buf
    }

    /// Fields in order
    pub fn iter(&self) -> impl Iterator<Item = &'a [u8]> + 'a {
        let record = *self;
        (0..record.count).map(move |i| record.get(i))
    }
}

// =============================================================================
// Writer
// =============================================================================

/// In-place builder for a packed record
///
/// `new` writes the header (the width is fixed from the buffer length),
/// `add` appends fields, and `seal` consumes the writer so a finished record
/// can no longer be extended.
pub struct RecordWriter<'a> {
    buf: &'a mut [u8],
    width: Width,
    count: usize,
}

impl<'a> RecordWriter<'a> {
    /// Start an empty record filling all of `buf`
    ///
    /// Size `buf` with [`super::bufsize`] so that every field fits and no
    /// space is wasted.
    pub fn new(buf: &'a mut [u8]) -> Result<Self> {
        let total = buf.len();
        let width = Width::for_size(total);

        if total < slot_pos(width, 1) {
            return Err(SndoError::InvalidRecord(format!(
                "{} bytes is too short for an empty record",
                total
            )));
        }
        if total > u32::MAX as usize {
            return Err(SndoError::InvalidRecord(format!(
                "{} bytes is too large for a record",
                total
            )));
        }

        buf[0] = width.bytes() as u8;
        buf[1..3].copy_from_slice(&0u16.to_le_bytes());
        width.write(buf, slot_pos(width, 0), total);

        Ok(Self {
            buf,
            width,
            count: 0,
        })
    }

    /// Offset where the last written field starts (total size if none)
    fn low_water(&self) -> usize {
        self.width.read(self.buf, slot_pos(self.width, self.count))
    }

    /// Data bytes still available for one more field
    pub fn remaining(&self) -> usize {
        self.low_water()
            .saturating_sub(slot_pos(self.width, self.count + 2))
    }

    /// Append one field
    pub fn add(&mut self, field: &[u8]) -> Result<()> {
        if self.count >= MAX_FIELDS {
            return Err(SndoError::InvalidRecord(format!(
                "record already holds {} fields",
                MAX_FIELDS
            )));
        }

        let available = self.remaining();
        if field.len() > available {
            return Err(SndoError::RecordOverflow {
                needed: field.len(),
                available,
            });
        }

        let offset = self.low_water() - field.len();
        self.buf[offset..offset + field.len()].copy_from_slice(field);
        self.width
            .write(self.buf, slot_pos(self.width, self.count + 1), offset);

        self.count += 1;
        self.buf[1..3].copy_from_slice(&(self.count as u16).to_le_bytes());
        Ok(())
    }

    pub fn field_count(&self) -> usize {
        self.count
    }

    pub fn width(&self) -> Width {
        self.width
    }

    /// Finish the record and view it read-only
    pub fn seal(self) -> PackedRecord<'a> {
        let buf: &'a [u8] = self.buf;
        PackedRecord {
            buf,
            width: self.width,
            count: self.count,
        }
    }
}
