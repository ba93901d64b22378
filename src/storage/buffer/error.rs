use std::io;

use thiserror::Error;

use crate::common::types::{PageId, TableId};
use crate::storage::page::PageError;
use crate::transaction::concurrency::TransactionError;
use crate::transaction::wal::LogError;

#[derive(Error, Debug)]
pub enum BufferPoolError {
    #[error("all pages in the buffer pool are dirty, none can be evicted")]
    AllPagesDirty,

    #[error("no table registered with id {0}")]
    UnknownTable(TableId),

    #[error("tuple has no record id")]
    UnstoredTuple,

    #[error(transparent)]
    Aborted(#[from] TransactionError),

    #[error("page error: {0}")]
    Page(#[from] PageError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("WAL error: {0}")]
    Wal(#[from] LogError),

    #[error("I/O error while evicting page {pid}: {source}")]
    EvictionIo { pid: PageId, source: io::Error },
}
