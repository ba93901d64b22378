use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::common::types::{Lsn, PageId, TransactionId};
use crate::transaction::wal::log_record::LogRecord;
use crate::transaction::wal::{LogError, WriteAheadLog};

/// File-backed write-ahead log.
///
/// Records are buffered in memory as length-prefixed bincode frames;
/// `force` appends the buffer to the log file and syncs it. A record is
/// durable once `force` has returned after its `log_write`.
pub struct LogManager {
    path: PathBuf,
    file: Mutex<File>,
    pending: Mutex<Vec<u8>>,
    next_lsn: AtomicU64,
}

impl LogManager {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        file.seek(SeekFrom::End(0))?;

        Ok(Self {
            path,
            file: Mutex::new(file),
            pending: Mutex::new(Vec::new()),
            next_lsn: AtomicU64::new(1),
        })
    }

    /// Read every record currently durable in the log file. Used by tests
    /// and by recovery bookkeeping; records still pending are not included.
    pub fn records(&self) -> Result<Vec<LogRecord>, LogError> {
        let mut reader = File::open(&self.path)?;
        let mut records = Vec::new();

        loop {
            let mut len_bytes = [0u8; 4];
            match reader.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_bytes) as usize;
            let mut frame = vec![0u8; len];
            reader.read_exact(&mut frame)?;
            records.push(LogRecord::deserialize(&frame)?);
        }

        Ok(records)
    }

    pub fn current_lsn(&self) -> Lsn {
        self.next_lsn.load(Ordering::SeqCst)
    }
}

impl WriteAheadLog for LogManager {
    fn log_write(
        &self,
        tid: TransactionId,
        pid: PageId,
        before_image: &[u8],
        after_image: &[u8],
    ) -> Result<Lsn, LogError> {
        let lsn = self.next_lsn.fetch_add(1, Ordering::SeqCst);
        let record = LogRecord {
            lsn,
            tid,
            pid,
            before_image: before_image.to_vec(),
            after_image: after_image.to_vec(),
        };
        let frame = record.serialize()?;

        let mut pending = self.pending.lock();
        pending.extend_from_slice(&(frame.len() as u32).to_le_bytes());
        pending.extend_from_slice(&frame);

        Ok(lsn)
    }

    fn force(&self) -> Result<(), LogError> {
        let mut pending = self.pending.lock();
        if pending.is_empty() {
            return Ok(());
        }

        let mut file = self.file.lock();
        file.write_all(&pending)?;
        file.sync_data()?;
        pending.clear();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_log() -> (LogManager, TempDir) {
        let dir = TempDir::new().unwrap();
        let log = LogManager::open(dir.path().join("wal.log")).unwrap();
        (log, dir)
    }

    #[test]
    fn test_records_become_durable_on_force() {
        let (log, _dir) = open_log();
        let tid = TransactionId::new();
        let pid = PageId::new(0, 0);

        let lsn = log.log_write(tid, pid, &[1, 2], &[3, 4]).unwrap();
        assert!(log.records().unwrap().is_empty());

        log.force().unwrap();
        let records = log.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].lsn, lsn);
        assert_eq!(records[0].tid, tid);
        assert_eq!(records[0].pid, pid);
        assert_eq!(records[0].before_image, vec![1, 2]);
        assert_eq!(records[0].after_image, vec![3, 4]);
    }

    #[test]
    fn test_lsns_are_monotone() {
        let (log, _dir) = open_log();
        let tid = TransactionId::new();

        let a = log.log_write(tid, PageId::new(0, 0), &[], &[]).unwrap();
        let b = log.log_write(tid, PageId::new(0, 1), &[], &[]).unwrap();
        assert!(b > a);

        log.force().unwrap();
        let records = log.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].lsn, a);
        assert_eq!(records[1].lsn, b);
    }

    #[test]
    fn test_force_on_empty_buffer_is_noop() {
        let (log, _dir) = open_log();
        log.force().unwrap();
        assert!(log.records().unwrap().is_empty());
    }
}
