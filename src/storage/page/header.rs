use byteorder::{ByteOrder, LittleEndian};

use crate::common::types::PAGE_SIZE;
use crate::storage::page::layout::HEADER_SIZE;

#[derive(Debug, Clone, Copy)]
pub struct PageHeader {
    pub free_space_offset: u16,
    pub free_space_size: u16,
    pub record_count: u16,
}

impl Default for PageHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl PageHeader {
    pub fn new() -> Self {
        Self {
            free_space_offset: HEADER_SIZE as u16,
            free_space_size: (PAGE_SIZE - HEADER_SIZE) as u16,
            record_count: 0,
        }
    }

    pub fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        LittleEndian::write_u16(&mut bytes[0..2], self.free_space_offset);
        LittleEndian::write_u16(&mut bytes[2..4], self.free_space_size);
        LittleEndian::write_u16(&mut bytes[4..6], self.record_count);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            free_space_offset: LittleEndian::read_u16(&bytes[0..2]),
            free_space_size: LittleEndian::read_u16(&bytes[2..4]),
            record_count: LittleEndian::read_u16(&bytes[4..6]),
        }
    }
}
