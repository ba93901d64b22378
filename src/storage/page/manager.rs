use crate::common::types::Page;
use crate::storage::page::error::PageError;
use crate::storage::page::header::PageHeader;
use crate::storage::page::layout::{slot_position, RecordLocation, HEADER_SIZE, SLOT_SIZE};

/// Record operations over the slotted page layout. Slot entries are stored
/// from the end of the page; record data from the beginning, after the header.
pub struct PageManager {}

impl Default for PageManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PageManager {
    pub fn new() -> Self {
        Self {}
    }

    pub fn init_page(&self, page: &mut Page) {
        let header = PageHeader::new();
        page.data[0..HEADER_SIZE].copy_from_slice(&header.to_bytes());
    }

    /// Insert a record, returning its slot index.
    pub fn insert_record(&self, page: &mut Page, data: &[u8]) -> Result<u16, PageError> {
        let mut header = self.header(page);

        let needed = data.len() + SLOT_SIZE;
        if (header.free_space_size as usize) < needed {
            return Err(PageError::InsufficientSpace);
        }

        let slot = header.record_count;
        let location = RecordLocation {
            offset: header.free_space_offset,
            length: data.len() as u16,
        };

        let start = location.offset as usize;
        page.data[start..start + data.len()].copy_from_slice(data);

        let slot_pos = slot_position(slot);
        page.data[slot_pos..slot_pos + SLOT_SIZE].copy_from_slice(&location.to_bytes());

        header.free_space_offset += data.len() as u16;
        header.free_space_size -= needed as u16;
        header.record_count += 1;
        page.data[0..HEADER_SIZE].copy_from_slice(&header.to_bytes());

        Ok(slot)
    }

    /// Delete a record by marking its slot length zero. The data bytes are
    /// left in place; the slot index stays valid and reads as deleted.
    pub fn delete_record(&self, page: &mut Page, slot: u16) -> Result<(), PageError> {
        let header = self.header(page);
        if slot >= header.record_count {
            return Err(PageError::InvalidSlot(slot));
        }

        let slot_pos = slot_position(slot);
        let mut location = RecordLocation::from_bytes(&page.data[slot_pos..slot_pos + SLOT_SIZE]);
        if location.length == 0 {
            return Err(PageError::RecordNotFound);
        }

        location.length = 0;
        page.data[slot_pos..slot_pos + SLOT_SIZE].copy_from_slice(&location.to_bytes());
        Ok(())
    }

    pub fn get_record(&self, page: &Page, slot: u16) -> Result<Vec<u8>, PageError> {
        let header = self.header(page);
        if slot >= header.record_count {
            return Err(PageError::InvalidSlot(slot));
        }

        let slot_pos = slot_position(slot);
        let location = RecordLocation::from_bytes(&page.data[slot_pos..slot_pos + SLOT_SIZE]);
        if location.length == 0 {
            return Err(PageError::RecordNotFound);
        }

        let start = location.offset as usize;
        Ok(page.data[start..start + location.length as usize].to_vec())
    }

    pub fn record_count(&self, page: &Page) -> u16 {
        self.header(page).record_count
    }

    pub fn free_space(&self, page: &Page) -> u16 {
        self.header(page).free_space_size
    }

    fn header(&self, page: &Page) -> PageHeader {
        PageHeader::from_bytes(&page.data[0..HEADER_SIZE])
    }
}
