use serde::{Deserialize, Serialize};

use crate::common::types::{Lsn, PageId, TransactionId};
use crate::transaction::wal::LogError;

/// An update record: one page write on behalf of one transaction, with the
/// page images needed to undo or redo it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub lsn: Lsn,
    pub tid: TransactionId,
    pub pid: PageId,
    pub before_image: Vec<u8>,
    pub after_image: Vec<u8>,
}

impl LogRecord {
    pub fn serialize(&self) -> Result<Vec<u8>, LogError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, LogError> {
        Ok(bincode::deserialize(bytes)?)
    }
}
