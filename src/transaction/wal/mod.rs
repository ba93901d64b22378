use std::io;

use thiserror::Error;

use crate::common::types::{Lsn, PageId, TransactionId};

pub mod log_manager;
pub mod log_record;

pub use log_manager::LogManager;
pub use log_record::LogRecord;

#[derive(Error, Debug)]
pub enum LogError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("log record encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

/// The write-ahead log as the buffer pool sees it: append an update record
/// for a page, and force everything appended so far to stable storage.
///
/// The flush protocol calls `log_write` then `force` strictly before the
/// page itself is written.
pub trait WriteAheadLog: Send + Sync {
    fn log_write(
        &self,
        tid: TransactionId,
        pid: PageId,
        before_image: &[u8],
        after_image: &[u8],
    ) -> Result<Lsn, LogError>;

    fn force(&self) -> Result<(), LogError>;
}
