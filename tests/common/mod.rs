use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use kestreldb::{BufferPool, Catalog, HeapFile, LogManager, TableId};

pub const TEST_TABLE: TableId = 1;

/// Everything a test needs: a pool over one registered heap file and a
/// temp-dir-backed WAL. Dropping it cleans the files up.
#[allow(dead_code)]
pub struct TestDb {
    pub pool: Arc<BufferPool>,
    pub table: Arc<HeapFile>,
    pub wal: Arc<LogManager>,
    _dir: TempDir,
}

#[allow(dead_code)]
pub fn create_test_db(max_pages: usize) -> Result<TestDb> {
    let dir = TempDir::new()?;

    let catalog = Arc::new(Catalog::new());
    let table = Arc::new(HeapFile::open(dir.path().join("table.db"), TEST_TABLE)?);
    catalog.register(table.clone());

    let wal = Arc::new(LogManager::open(dir.path().join("wal.log"))?);
    let pool = Arc::new(BufferPool::new(max_pages, catalog, wal.clone()));

    Ok(TestDb {
        pool,
        table,
        wal,
        _dir: dir,
    })
}

// Generate test data of specified size
#[allow(dead_code)]
pub fn generate_test_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}
