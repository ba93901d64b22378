use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Page size in bytes, header inclusive
pub const PAGE_SIZE: usize = 4096;

/// Default buffer pool capacity, in pages
pub const DEFAULT_PAGES: usize = 50;

/// Table ID type
pub type TableId = u32;

/// LSN (Log Sequence Number) type
pub type Lsn = u64;

const MAX_PAGES_PER_TABLE: u32 = 1_048_573;

/// Identifies one page of one table. Used as the key in the buffer pool's
/// cache and in all of the lock manager's maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageId {
    pub table_id: TableId,
    pub page_no: u32,
}

impl PageId {
    pub fn new(table_id: TableId, page_no: u32) -> Self {
        Self { table_id, page_no }
    }

    /// On-disk representation: the two integers, in order.
    pub fn serialize(&self) -> [u32; 2] {
        [self.table_id, self.page_no]
    }

    pub fn from_serialized(data: [u32; 2]) -> Self {
        Self {
            table_id: data[0],
            page_no: data[1],
        }
    }
}

impl Hash for PageId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let code = self
            .table_id
            .wrapping_mul(MAX_PAGES_PER_TABLE)
            .wrapping_add(self.page_no)
            .wrapping_add(31);
        state.write_u32(code);
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_no)
    }
}

static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque, process-unique transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(u64);

impl TransactionId {
    pub fn new() -> Self {
        Self(NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

/// Lock mode requested when fetching a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

/// A fixed-size database page.
///
/// The dirtier names the transaction whose uncommitted changes the page
/// holds; the before-image is the page content as of the start of that
/// transaction's modifications, kept for write-ahead logging.
#[derive(Debug, Clone)]
pub struct Page {
    pub data: [u8; PAGE_SIZE],
    pid: PageId,
    dirtier: Option<TransactionId>,
    before_image: Box<[u8; PAGE_SIZE]>,
}

impl Page {
    /// A zeroed page. Callers laying out records should initialize the
    /// header and then call [`Page::set_before_image`].
    pub fn new(pid: PageId) -> Self {
        Self {
            data: [0; PAGE_SIZE],
            pid,
            dirtier: None,
            before_image: Box::new([0; PAGE_SIZE]),
        }
    }

    /// A page loaded from disk; the before-image starts as the loaded bytes.
    pub fn from_bytes(pid: PageId, data: [u8; PAGE_SIZE]) -> Self {
        Self {
            data,
            pid,
            dirtier: None,
            before_image: Box::new(data),
        }
    }

    pub fn pid(&self) -> PageId {
        self.pid
    }

    /// `Some(tid)` marks the page dirty on behalf of `tid`; `None` clears it.
    pub fn mark_dirty(&mut self, dirtier: Option<TransactionId>) {
        self.dirtier = dirtier;
    }

    pub fn dirtier(&self) -> Option<TransactionId> {
        self.dirtier
    }

    pub fn is_dirty(&self) -> bool {
        self.dirtier.is_some()
    }

    pub fn before_image(&self) -> &[u8; PAGE_SIZE] {
        &self.before_image
    }

    /// Snapshot the current contents as the new before-image. Called after
    /// a commit-flush so the next transaction logs against committed state.
    pub fn set_before_image(&mut self) {
        self.before_image.copy_from_slice(&self.data);
    }
}

/// Shared handle to a cached page. The lock manager's permission state is
/// what makes concurrent access through this handle safe; a caller holding
/// only a shared lock must not write through it.
pub type PagePtr = Arc<RwLock<Page>>;
