use std::sync::Arc;

use anyhow::Result;

use kestreldb::{
    BufferPool, Catalog, HeapFile, LogManager, Permission, TransactionId, Tuple, DEFAULT_PAGES,
};

fn main() -> Result<()> {
    // Set up the collaborators: one heap file, a catalog, and the WAL
    let catalog = Arc::new(Catalog::new());
    let table = Arc::new(HeapFile::open("kestrel_table.db", 1)?);
    catalog.register(table.clone());

    let wal = Arc::new(LogManager::open("kestrel_wal.log")?);
    println!("WAL initialized");

    let pool = BufferPool::new(DEFAULT_PAGES, catalog, wal.clone());
    println!("Buffer pool initialized with {} page slots", DEFAULT_PAGES);

    // A committing transaction
    let t1 = TransactionId::new();
    let mut tuple = Tuple::new(b"hello, storage engine".to_vec());
    pool.insert_tuple(t1, 1, &mut tuple)?;
    let rid = tuple.record_id().expect("tuple was stored");
    println!("{t1} inserted a tuple at page {}, slot {}", rid.pid, rid.slot);

    pool.transaction_complete(t1, true)?;
    println!("{t1} committed; {} WAL records on disk", wal.records()?.len());

    // An aborting transaction: its insert is rolled back
    let t2 = TransactionId::new();
    let mut doomed = Tuple::new(b"never to be seen".to_vec());
    pool.insert_tuple(t2, 1, &mut doomed)?;
    pool.transaction_complete(t2, false)?;
    println!("{t2} aborted; its insert was rolled back");

    // A reader observes only the committed tuple
    let t3 = TransactionId::new();
    let page = pool.get_page(t3, rid.pid, Permission::ReadOnly)?;
    let stored = kestreldb::PageManager::new().get_record(&page.read(), rid.slot)?;
    println!(
        "{t3} read back: {:?}",
        String::from_utf8_lossy(&stored)
    );
    pool.transaction_complete(t3, true)?;

    Ok(())
}
