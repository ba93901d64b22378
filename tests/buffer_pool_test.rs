use anyhow::Result;

use kestreldb::{BufferPoolError, DbFile, PageId, PageManager, Permission, TransactionId, Tuple};

mod common;
use common::{create_test_db, generate_test_data, TEST_TABLE};

fn pid(page_no: u32) -> PageId {
    PageId::new(TEST_TABLE, page_no)
}

#[test]
fn test_read_through_caches_pages() -> Result<()> {
    let db = create_test_db(2)?;
    let t1 = TransactionId::new();

    db.pool.get_page(t1, pid(0), Permission::ReadOnly)?;
    db.pool.get_page(t1, pid(1), Permission::ReadOnly)?;

    assert_eq!(db.pool.cached_pages(), 2);
    assert!(db.pool.is_cached(pid(0)));
    assert!(db.pool.is_cached(pid(1)));
    assert!(db.pool.holds_lock(t1, pid(0)));
    assert!(db.pool.holds_lock(t1, pid(1)));

    db.pool.transaction_complete(t1, true)?;
    Ok(())
}

#[test]
fn test_fetch_returns_unique_cached_instance() -> Result<()> {
    let db = create_test_db(4)?;
    let t1 = TransactionId::new();

    let first = db.pool.get_page(t1, pid(0), Permission::ReadOnly)?;
    let second = db.pool.get_page(t1, pid(0), Permission::ReadOnly)?;
    assert!(std::sync::Arc::ptr_eq(&first, &second));

    db.pool.transaction_complete(t1, true)?;
    Ok(())
}

#[test]
fn test_eviction_picks_least_recently_used_clean_page() -> Result<()> {
    let db = create_test_db(2)?;
    let t1 = TransactionId::new();

    db.pool.get_page(t1, pid(0), Permission::ReadOnly)?;
    db.pool.get_page(t1, pid(1), Permission::ReadOnly)?;
    db.pool.get_page(t1, pid(2), Permission::ReadOnly)?;

    assert_eq!(db.pool.cached_pages(), 2);
    assert!(!db.pool.is_cached(pid(0)));
    assert!(db.pool.is_cached(pid(1)));
    assert!(db.pool.is_cached(pid(2)));

    db.pool.transaction_complete(t1, true)?;
    Ok(())
}

#[test]
fn test_cache_never_exceeds_capacity() -> Result<()> {
    let db = create_test_db(3)?;
    let t1 = TransactionId::new();

    for page_no in 0..10 {
        db.pool.get_page(t1, pid(page_no), Permission::ReadOnly)?;
        assert!(db.pool.cached_pages() <= 3);
    }

    db.pool.transaction_complete(t1, true)?;
    Ok(())
}

#[test]
fn test_all_dirty_cache_fails_to_evict() -> Result<()> {
    let db = create_test_db(1)?;
    let t1 = TransactionId::new();
    let t2 = TransactionId::new();

    let mut tuple = Tuple::new(generate_test_data(64));
    db.pool.insert_tuple(t1, TEST_TABLE, &mut tuple)?;
    assert_eq!(db.pool.cached_pages(), 1);

    let err = db
        .pool
        .get_page(t2, pid(1), Permission::ReadOnly)
        .unwrap_err();
    assert!(matches!(err, BufferPoolError::AllPagesDirty));

    // Once the dirtier commits, the page is clean and evictable again.
    db.pool.transaction_complete(t1, true)?;
    db.pool.get_page(t2, pid(1), Permission::ReadOnly)?;
    assert_eq!(db.pool.cached_pages(), 1);
    assert!(db.pool.is_cached(pid(1)));

    db.pool.transaction_complete(t2, true)?;
    Ok(())
}

#[test]
fn test_insert_and_delete_tuple() -> Result<()> {
    let db = create_test_db(4)?;
    let t1 = TransactionId::new();

    let payload = generate_test_data(128);
    let mut tuple = Tuple::new(payload.clone());
    db.pool.insert_tuple(t1, TEST_TABLE, &mut tuple)?;

    let rid = tuple.record_id().expect("insert sets the record id");
    let page = db.pool.get_page(t1, rid.pid, Permission::ReadOnly)?;
    assert_eq!(
        PageManager::new().get_record(&page.read(), rid.slot)?,
        payload
    );
    assert_eq!(page.read().dirtier(), Some(t1));

    db.pool.delete_tuple(t1, &tuple)?;
    assert!(PageManager::new().get_record(&page.read(), rid.slot).is_err());

    db.pool.transaction_complete(t1, true)?;
    Ok(())
}

#[test]
fn test_insert_spills_to_new_page_when_full() -> Result<()> {
    let db = create_test_db(4)?;
    let t1 = TransactionId::new();

    // Two tuples of 3000 bytes cannot share one 4096-byte page.
    let mut first = Tuple::new(generate_test_data(3000));
    let mut second = Tuple::new(generate_test_data(3000));
    db.pool.insert_tuple(t1, TEST_TABLE, &mut first)?;
    db.pool.insert_tuple(t1, TEST_TABLE, &mut second)?;

    let first_rid = first.record_id().unwrap();
    let second_rid = second.record_id().unwrap();
    assert_ne!(first_rid.pid, second_rid.pid);

    db.pool.transaction_complete(t1, true)?;
    assert_eq!(db.table.num_pages()?, 2);
    Ok(())
}

#[test]
fn test_flush_pages_writes_a_transactions_dirty_pages() -> Result<()> {
    let db = create_test_db(4)?;
    let t1 = TransactionId::new();

    let mut first = Tuple::new(generate_test_data(3000));
    let mut second = Tuple::new(generate_test_data(3000));
    db.pool.insert_tuple(t1, TEST_TABLE, &mut first)?;
    db.pool.insert_tuple(t1, TEST_TABLE, &mut second)?;

    db.pool.flush_pages(t1)?;

    let flushed = db.pool.flushed_pages(t1);
    assert!(flushed.contains(&first.record_id().unwrap().pid));
    assert!(flushed.contains(&second.record_id().unwrap().pid));
    assert_eq!(db.wal.records()?.len(), 2);

    // The pages are clean now; committing has nothing left to flush.
    db.pool.transaction_complete(t1, true)?;
    assert_eq!(db.wal.records()?.len(), 2);
    Ok(())
}

#[test]
fn test_discard_page_drops_cache_and_locks() -> Result<()> {
    let db = create_test_db(4)?;
    let t1 = TransactionId::new();

    let page = db.pool.get_page(t1, pid(0), Permission::ReadWrite)?;
    page.write().mark_dirty(Some(t1));

    db.pool.discard_page(pid(0));
    assert!(!db.pool.is_cached(pid(0)));
    assert_eq!(db.pool.cached_pages(), 0);
    assert!(!db.pool.holds_lock(t1, pid(0)));

    db.pool.transaction_complete(t1, false)?;
    Ok(())
}

#[test]
fn test_unknown_table_is_an_error() -> Result<()> {
    let db = create_test_db(4)?;
    let t1 = TransactionId::new();

    let err = db
        .pool
        .get_page(t1, PageId::new(99, 0), Permission::ReadOnly)
        .unwrap_err();
    assert!(matches!(err, BufferPoolError::UnknownTable(99)));

    db.pool.transaction_complete(t1, false)?;
    Ok(())
}
