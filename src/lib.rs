// Export public modules
pub mod common;
pub mod storage;
pub mod transaction;

// Re-export key items for convenient access
pub use common::types::{
    Page, PageId, PagePtr, Permission, TableId, TransactionId, DEFAULT_PAGES, PAGE_SIZE,
};
pub use storage::buffer::{BufferPool, BufferPoolError};
pub use storage::file::{Catalog, DbFile, HeapFile, RecordId, Tuple};
pub use storage::page::PageManager;
pub use transaction::concurrency::{LockManager, TransactionError};
pub use transaction::wal::{LogManager, WriteAheadLog};
