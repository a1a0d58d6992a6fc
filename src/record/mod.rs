//! Packed Record Module
//!
//! Compact serialization of an ordered list of byte fields.
//!
//! ## Record Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Tag: u8 (1) │ FieldCount: u16 (2)                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Offset Table: (FieldCount + 1) entries of Tag bytes each    │
//! │   [Total][Off 0][Off 1] ... [Off n-1]                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Free space (empty once fully built)                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Field data, written back to front                           │
//! │   [Field n-1] ... [Field 1][Field 0]                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Field `i` occupies `[Off i, Off i-1)` with `Off -1 = Total`. The tag is
//! the width of one offset entry (1, 2 or 4 bytes), the smallest that can
//! address the whole record.

mod mem;
mod packed;

pub use mem::MemRecord;
pub use packed::{PackedRecord, RecordWriter};

/// Tag (1) + FieldCount (2)
pub const RECORD_HEADER_SIZE: usize = 3;

/// Most fields a record can hold (FieldCount is a u16)
pub const MAX_FIELDS: usize = u16::MAX as usize;

/// Width of one offset-table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Byte,
    Short,
    Int,
}

impl Width {
    /// Entry size in bytes (also the on-disk tag)
    pub const fn bytes(self) -> usize {
        match self {
            Width::Byte => 1,
            Width::Short => 2,
            Width::Int => 4,
        }
    }

    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Width::Byte),
            2 => Some(Width::Short),
            4 => Some(Width::Int),
            _ => None,
        }
    }

    /// Narrowest width able to hold offsets into a record of `total` bytes
    pub const fn for_size(total: usize) -> Self {
        if total < 1 << 8 {
            Width::Byte
        } else if total < 1 << 16 {
            Width::Short
        } else {
            Width::Int
        }
    }

    pub(crate) fn read(self, buf: &[u8], at: usize) -> usize {
        match self {
            Width::Byte => buf[at] as usize,
            Width::Short => u16::from_le_bytes([buf[at], buf[at + 1]]) as usize,
            Width::Int => {
                u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]) as usize
            }
        }
    }

    pub(crate) fn write(self, buf: &mut [u8], at: usize, value: usize) {
        match self {
            Width::Byte => buf[at] = value as u8,
            Width::Short => buf[at..at + 2].copy_from_slice(&(value as u16).to_le_bytes()),
            Width::Int => buf[at..at + 4].copy_from_slice(&(value as u32).to_le_bytes()),
        }
    }
}

/// Byte position of offset-table slot `slot` (slot 0 holds the total size)
#[inline]
pub(crate) fn slot_pos(width: Width, slot: usize) -> usize {
    RECORD_HEADER_SIZE + slot * width.bytes()
}

/// Minimal buffer size for `field_count` fields totalling `data_size` bytes
///
/// Tries byte-wide offsets first, widening only when the record would be
/// too large to address with them.
pub fn bufsize(field_count: usize, data_size: usize) -> usize {
    let size_with = |w: Width| RECORD_HEADER_SIZE + (field_count + 1) * w.bytes() + data_size;

    for width in [Width::Byte, Width::Short] {
        let size = size_with(width);
        if Width::for_size(size) == width {
            return size;
        }
    }
    size_with(Width::Int)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_boundaries() {
        assert_eq!(Width::for_size(255), Width::Byte);
        assert_eq!(Width::for_size(256), Width::Short);
        assert_eq!(Width::for_size(65535), Width::Short);
        assert_eq!(Width::for_size(65536), Width::Int);
    }

    #[test]
    fn test_bufsize_empty() {
        // header + total slot
        assert_eq!(bufsize(0, 0), 4);
    }

    #[test]
    fn test_bufsize_widens_at_256() {
        // 3 + 2*1 + 250 = 255 stays byte-wide
        assert_eq!(bufsize(1, 250), 255);
        // 3 + 2*1 + 251 = 256 must widen: 3 + 2*2 + 251
        assert_eq!(bufsize(1, 251), 258);
    }

    #[test]
    fn test_bufsize_widens_at_65536() {
        // 3 + 2*2 + 65528 = 65535
        assert_eq!(bufsize(1, 65528), 65535);
        // 3 + 2*2 + 65529 = 65536 -> 3 + 2*4 + 65529
        assert_eq!(bufsize(1, 65529), 65540);
    }

    #[test]
    fn test_width_read_write() {
        let mut buf = [0u8; 8];
        for (width, value) in [(Width::Byte, 0xab), (Width::Short, 0xbeef), (Width::Int, 0x0102_0304)] {
            width.write(&mut buf, 2, value);
            assert_eq!(width.read(&buf, 2), value);
        }
        assert_eq!(Width::from_tag(3), None);
        assert_eq!(Width::from_tag(Width::Int.bytes() as u8), Some(Width::Int));
    }
}
