// title/record.rs from rustiiu (c) 2025 NinjaCheetah & Contributors
// https://github.com/NinjaCheetah/rustiiu
//
// Implements fixed-offset access to the binary records (TMDs and Tickets) used by the CDN, along
// with the table of every offset that this library reads or patches.

use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("field {start:#X}..{end:#X} is out of bounds for a record of {len:#X} bytes")]
    OutOfBounds { start: usize, end: usize, len: usize },
}

/// A byte range `[start, end)` inside a binary record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub start: usize,
    pub end: usize,
}

impl Field {
    pub const fn new(start: usize, end: usize) -> Self {
        Field { start, end }
    }

    /// Creates a field of `len` bytes that begins at `start`.
    pub const fn sized(start: usize, len: usize) -> Self {
        Field { start, end: start + len }
    }

    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    pub const fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Returns the same field moved forward by `offset` bytes.
    pub const fn offset(&self, offset: usize) -> Self {
        Field { start: self.start + offset, end: self.end + offset }
    }
}

/// Offsets shared by TMDs and Tickets. Both records begin with a 0x140 byte signature block, and
/// everything past it is addressed relative to that base.
pub mod layout {
    use super::Field;

    /// Base offset of the signed body in both TMDs and Tickets.
    pub const TK: usize = 0x140;

    // == TMD ==
    pub const TMD_TITLE_VERSION: Field = Field::new(TK + 0x9C, TK + 0x9E);
    pub const TMD_NUM_CONTENTS: Field = Field::new(TK + 0x9E, TK + 0xA0);
    /// The first content record. Each following record is CONTENT_RECORD_SIZE bytes further in.
    pub const TMD_CONTENT_RECORDS_START: usize = 0xB04;
    pub const CONTENT_RECORD_SIZE: usize = 0x30;
    pub const CONTENT_RECORD_ID: Field = Field::new(0x00, 0x04);
    pub const CONTENT_RECORD_SIZE_FIELD: Field = Field::new(0x08, 0x10);

    // == Ticket ==
    pub const TICKET_TITLE_KEY: Field = Field::new(TK + 0x7F, TK + 0x8F);
    pub const TICKET_TITLE_ID: Field = Field::new(TK + 0x9C, TK + 0xA4);
    pub const TICKET_TITLE_VERSION: Field = Field::new(TK + 0xA6, TK + 0xA8);
    /// Play limit entries that are cleared to remove the restrictions on a demo.
    pub const TICKET_DEMO_LIMITS: Field = Field::new(TK + 0x124, TK + 0x164);
    /// Content access permission block that is replaced to unlock every piece of DLC.
    pub const TICKET_DLC_ACCESS: Field = Field::new(TK + 0x164, TK + 0x210);

    /// Returns the field holding the given piece of a content record at `index`.
    pub const fn content_record_field(index: usize, field: Field) -> Field {
        field.offset(TMD_CONTENT_RECORDS_START + CONTENT_RECORD_SIZE * index)
    }
}

/// Reads the raw bytes of `field` out of `data`.
pub fn read(data: &[u8], field: Field) -> Result<&[u8], RecordError> {
    data.get(field.start..field.end).ok_or(RecordError::OutOfBounds {
        start: field.start,
        end: field.end,
        len: data.len(),
    })
}

/// Reads `field` into a fixed-size array. The field must be exactly N bytes wide.
pub fn read_array<const N: usize>(data: &[u8], field: Field) -> Result<[u8; N], RecordError> {
    assert_eq!(field.len(), N, "field {:#X}..{:#X} is not {} bytes wide", field.start, field.end, N);
    let mut out = [0u8; N];
    out.copy_from_slice(read(data, field)?);
    Ok(out)
}

pub fn read_u16(data: &[u8], field: Field) -> Result<u16, RecordError> {
    Ok(BigEndian::read_u16(&read_array::<2>(data, field)?))
}

pub fn read_u64(data: &[u8], field: Field) -> Result<u64, RecordError> {
    Ok(BigEndian::read_u64(&read_array::<8>(data, field)?))
}

/// Overwrites `field` in `data` with `value`. The value has to already be encoded to the width of
/// the field; anything else is a bug in the caller.
pub fn write(data: &mut [u8], field: Field, value: &[u8]) -> Result<(), RecordError> {
    assert_eq!(value.len(), field.len(), "value of {} bytes does not fit field {:#X}..{:#X}", value.len(), field.start, field.end);
    let len = data.len();
    let target = data.get_mut(field.start..field.end).ok_or(RecordError::OutOfBounds {
        start: field.start,
        end: field.end,
        len,
    })?;
    target.copy_from_slice(value);
    Ok(())
}

/// Fills every byte of `field` with `value`.
pub fn fill(data: &mut [u8], field: Field, value: u8) -> Result<(), RecordError> {
    write(data, field, &vec![value; field.len()])
}
