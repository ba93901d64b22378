use byteorder::{ByteOrder, LittleEndian};

use crate::common::types::PAGE_SIZE;

/// Size of the fixed page header at offset 0.
pub const HEADER_SIZE: usize = 8;

/// Size of one slot directory entry.
pub const SLOT_SIZE: usize = 4;

/// Location of a record inside a page. Slots live at the end of the page
/// and grow downward; record data starts after the header and grows upward.
/// A zero length marks a deleted slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLocation {
    pub offset: u16,
    pub length: u16,
}

impl RecordLocation {
    pub fn to_bytes(self) -> [u8; SLOT_SIZE] {
        let mut bytes = [0u8; SLOT_SIZE];
        LittleEndian::write_u16(&mut bytes[0..2], self.offset);
        LittleEndian::write_u16(&mut bytes[2..4], self.length);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            offset: LittleEndian::read_u16(&bytes[0..2]),
            length: LittleEndian::read_u16(&bytes[2..4]),
        }
    }
}

/// Byte position of a slot's directory entry, counted from the page end.
pub fn slot_position(slot: u16) -> usize {
    PAGE_SIZE - SLOT_SIZE * (slot as usize + 1)
}
