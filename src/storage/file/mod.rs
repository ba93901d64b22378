use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::types::{Page, PageId, PagePtr, TableId, TransactionId};
use crate::storage::buffer::{BufferPool, BufferPoolError};

pub mod heap;

pub use heap::HeapFile;

/// Location of a stored tuple: the page it lives on and its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordId {
    pub pid: PageId,
    pub slot: u16,
}

impl RecordId {
    pub fn new(pid: PageId, slot: u16) -> Self {
        Self { pid, slot }
    }
}

/// An opaque tuple payload. The record id is set once the tuple has been
/// stored and is what `delete_tuple` resolves the owning table from.
#[derive(Debug, Clone)]
pub struct Tuple {
    data: Vec<u8>,
    rid: Option<RecordId>,
}

impl Tuple {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, rid: None }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.rid
    }

    pub fn set_record_id(&mut self, rid: RecordId) {
        self.rid = Some(rid);
    }
}

/// On-disk storage for one table, addressed by the buffer pool.
///
/// `insert_tuple` and `delete_tuple` fetch the pages they touch through the
/// buffer pool so the calling transaction acquires the proper locks; they
/// return the pages they modified and the pool marks those dirty.
pub trait DbFile: Send + Sync {
    fn table_id(&self) -> TableId;

    fn read_page(&self, pid: PageId) -> io::Result<Page>;

    fn write_page(&self, page: &Page) -> io::Result<()>;

    fn num_pages(&self) -> io::Result<u32>;

    fn insert_tuple(
        &self,
        tid: TransactionId,
        tuple: &mut Tuple,
        pool: &BufferPool,
    ) -> Result<Vec<PagePtr>, BufferPoolError>;

    fn delete_tuple(
        &self,
        tid: TransactionId,
        tuple: &Tuple,
        pool: &BufferPool,
    ) -> Result<PagePtr, BufferPoolError>;
}

/// Maps table ids to their files. Injected into the buffer pool at
/// construction rather than reached through process-wide state.
#[derive(Default)]
pub struct Catalog {
    files: RwLock<HashMap<TableId, Arc<dyn DbFile>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, file: Arc<dyn DbFile>) {
        self.files.write().insert(file.table_id(), file);
    }

    pub fn db_file(&self, table_id: TableId) -> Option<Arc<dyn DbFile>> {
        self.files.read().get(&table_id).cloned()
    }
}
