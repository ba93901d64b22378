use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;
use parking_lot::Mutex;

use crate::common::types::{Page, PageId, PagePtr, Permission, TableId, TransactionId, PAGE_SIZE};
use crate::storage::buffer::{BufferPool, BufferPoolError};
use crate::storage::file::{DbFile, RecordId, Tuple};
use crate::storage::page::{PageError, PageManager};

/// File-backed table storage: a flat sequence of slotted pages.
pub struct HeapFile {
    file: Mutex<File>,
    table_id: TableId,
}

impl HeapFile {
    pub fn open(path: impl AsRef<Path>, table_id: TableId) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        Ok(Self {
            file: Mutex::new(file),
            table_id,
        })
    }

    /// Extend the file with one fresh, initialized page and return its id.
    fn append_page(&self) -> io::Result<PageId> {
        let mut file = self.file.lock();

        let file_size = file.metadata()?.len();
        let page_no = (file_size / PAGE_SIZE as u64) as u32;
        let pid = PageId::new(self.table_id, page_no);

        let mut page = Page::new(pid);
        PageManager::new().init_page(&mut page);

        file.seek(SeekFrom::End(0))?;
        file.write_all(&page.data)?;
        file.flush()?;

        debug!("heap file {} grew to page {}", self.table_id, page_no);
        Ok(pid)
    }

    fn page_offset(pid: PageId) -> u64 {
        pid.page_no as u64 * PAGE_SIZE as u64
    }
}

impl DbFile for HeapFile {
    fn table_id(&self) -> TableId {
        self.table_id
    }

    fn read_page(&self, pid: PageId) -> io::Result<Page> {
        let offset = Self::page_offset(pid);
        let mut buffer = [0u8; PAGE_SIZE];

        let mut file = self.file.lock();
        let file_size = file.metadata()?.len();

        // A read past the end yields a fresh page rather than an error, so
        // callers can address pages the file has not materialized yet.
        if offset >= file_size {
            let mut page = Page::new(pid);
            PageManager::new().init_page(&mut page);
            page.set_before_image();
            return Ok(page);
        }

        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buffer)?;

        Ok(Page::from_bytes(pid, buffer))
    }

    fn write_page(&self, page: &Page) -> io::Result<()> {
        let offset = Self::page_offset(page.pid());

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&page.data)?;
        file.flush()?;

        Ok(())
    }

    fn num_pages(&self) -> io::Result<u32> {
        let file = self.file.lock();
        Ok((file.metadata()?.len() / PAGE_SIZE as u64) as u32)
    }

    fn insert_tuple(
        &self,
        tid: TransactionId,
        tuple: &mut Tuple,
        pool: &BufferPool,
    ) -> Result<Vec<PagePtr>, BufferPoolError> {
        let page_manager = PageManager::new();

        for page_no in 0..self.num_pages()? {
            let pid = PageId::new(self.table_id, page_no);
            let ptr = pool.get_page(tid, pid, Permission::ReadWrite)?;

            let full = {
                let mut page = ptr.write();
                match page_manager.insert_record(&mut page, tuple.data()) {
                    Ok(slot) => {
                        tuple.set_record_id(RecordId::new(pid, slot));
                        false
                    }
                    Err(PageError::InsufficientSpace) => true,
                    Err(e) => return Err(e.into()),
                }
            };

            if !full {
                return Ok(vec![ptr]);
            }

            // The probe did not touch the page; give the lock back unless the
            // transaction has already dirtied it for other reasons.
            if ptr.read().dirtier() != Some(tid) {
                pool.release_page(tid, pid);
            }
        }

        let pid = self.append_page()?;
        let ptr = pool.get_page(tid, pid, Permission::ReadWrite)?;
        {
            let mut page = ptr.write();
            let slot = page_manager.insert_record(&mut page, tuple.data())?;
            tuple.set_record_id(RecordId::new(pid, slot));
        }

        Ok(vec![ptr])
    }

    fn delete_tuple(
        &self,
        tid: TransactionId,
        tuple: &Tuple,
        pool: &BufferPool,
    ) -> Result<PagePtr, BufferPoolError> {
        let rid = tuple.record_id().ok_or(BufferPoolError::UnstoredTuple)?;

        let ptr = pool.get_page(tid, rid.pid, Permission::ReadWrite)?;
        PageManager::new().delete_record(&mut ptr.write(), rid.slot)?;

        Ok(ptr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn open_heap() -> (HeapFile, NamedTempFile) {
        let file = NamedTempFile::new().unwrap();
        let heap = HeapFile::open(file.path(), 1).unwrap();
        (heap, file)
    }

    #[test]
    fn test_read_past_eof_yields_fresh_page() {
        let (heap, _file) = open_heap();
        assert_eq!(heap.num_pages().unwrap(), 0);

        let page = heap.read_page(PageId::new(1, 5)).unwrap();
        assert_eq!(page.pid(), PageId::new(1, 5));
        assert_eq!(PageManager::new().record_count(&page), 0);
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let (heap, _file) = open_heap();
        let pid = PageId::new(1, 0);

        let mut page = heap.read_page(pid).unwrap();
        PageManager::new().insert_record(&mut page, b"stored").unwrap();
        heap.write_page(&page).unwrap();

        let reread = heap.read_page(pid).unwrap();
        assert_eq!(PageManager::new().get_record(&reread, 0).unwrap(), b"stored");
        assert_eq!(heap.num_pages().unwrap(), 1);
    }

    #[test]
    fn test_append_page_extends_file() {
        let (heap, _file) = open_heap();
        let first = heap.append_page().unwrap();
        let second = heap.append_page().unwrap();

        assert_eq!(first.page_no, 0);
        assert_eq!(second.page_no, 1);
        assert_eq!(heap.num_pages().unwrap(), 2);
    }
}
