use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::debug;
use parking_lot::{Mutex, RwLock};

use crate::common::types::{PageId, PagePtr, Permission, TableId, TransactionId};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::replacer::LruReplacer;
use crate::storage::file::{Catalog, DbFile, Tuple};
use crate::transaction::concurrency::LockManager;
use crate::transaction::wal::WriteAheadLog;

struct PageCache {
    pages: HashMap<PageId, PagePtr>,
    replacer: LruReplacer,
    /// Pages that were dirtied by a transaction and have since been flushed,
    /// kept so crash recovery can tell which on-disk pages reflect whom.
    flushed_by_tx: HashMap<TransactionId, HashSet<PageId>>,
}

/// Bounded in-memory page cache mediating all page access.
///
/// Every fetch goes through the lock manager first, so a returned page is
/// covered by the requested permission until the transaction completes.
/// Buffering is NO-STEAL: dirty pages are never evicted, which is what lets
/// abort be implemented as a reload of the on-disk image.
pub struct BufferPool {
    max_pages: usize,
    cache: Mutex<PageCache>,
    lock_manager: LockManager,
    catalog: Arc<Catalog>,
    wal: Arc<dyn WriteAheadLog>,
}

impl BufferPool {
    pub fn new(max_pages: usize, catalog: Arc<Catalog>, wal: Arc<dyn WriteAheadLog>) -> Self {
        Self {
            max_pages,
            cache: Mutex::new(PageCache {
                pages: HashMap::new(),
                replacer: LruReplacer::new(max_pages),
                flushed_by_tx: HashMap::new(),
            }),
            lock_manager: LockManager::new(),
            catalog,
            wal,
        }
    }

    /// Fetch a page on behalf of `tid` with the given permission.
    ///
    /// Blocks until the lock is granted and may surface a transaction abort.
    /// The returned handle is the unique cached instance for the page until
    /// it is evicted or discarded. Fails with
    /// [`BufferPoolError::AllPagesDirty`] when the cache is full and every
    /// resident page is dirty.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permission,
    ) -> Result<PagePtr, BufferPoolError> {
        self.lock_manager.request_lock(tid, pid, perm)?;

        let mut cache = self.cache.lock();

        if let Some(ptr) = cache.pages.get(&pid).cloned() {
            cache.replacer.record_access(pid);
            return Ok(ptr);
        }

        if cache.pages.len() >= self.max_pages {
            self.evict_page(&mut cache)?;
        }

        let file = self.db_file(pid.table_id)?;
        let page = file.read_page(pid)?;
        let ptr: PagePtr = Arc::new(RwLock::new(page));

        cache.pages.insert(pid, Arc::clone(&ptr));
        cache.replacer.record_access(pid);

        Ok(ptr)
    }

    /// Release `tid`'s lock on one page without completing the transaction.
    ///
    /// This breaks two-phase locking and is unsafe in the general case; it
    /// exists for callers that probed a page and know they left no trace on
    /// it, such as a heap file scanning for free space.
    pub fn release_page(&self, tid: TransactionId, pid: PageId) {
        self.lock_manager.release_lock(tid, pid);
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_manager.holds_lock(tid, pid)
    }

    /// Commit or abort `tid`.
    ///
    /// On commit every page `tid` dirtied is flushed (log first, then page);
    /// on abort each one is replaced by the on-disk image. Either way all of
    /// `tid`'s locks are released.
    pub fn transaction_complete(
        &self,
        tid: TransactionId,
        commit: bool,
    ) -> Result<(), BufferPoolError> {
        {
            let mut cache = self.cache.lock();
            let dirtied: Vec<PageId> = cache
                .pages
                .iter()
                .filter(|(_, ptr)| ptr.read().dirtier() == Some(tid))
                .map(|(&pid, _)| pid)
                .collect();

            for pid in dirtied {
                if commit {
                    self.flush_page_locked(&mut cache, pid)?;
                    if let Some(ptr) = cache.pages.get(&pid) {
                        ptr.write().set_before_image();
                    }
                } else {
                    let file = self.db_file(pid.table_id)?;
                    let page = file.read_page(pid)?;
                    cache.pages.insert(pid, Arc::new(RwLock::new(page)));
                }
            }
        }

        self.lock_manager.release_all_pages(tid);
        Ok(())
    }

    /// Insert a tuple into `table_id` on behalf of `tid`, marking every page
    /// the insertion touched as dirtied by `tid`. The tuple's record id is
    /// set to where it landed.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> Result<(), BufferPoolError> {
        let file = self.db_file(table_id)?;
        let dirtied = file.insert_tuple(tid, tuple, self)?;

        for ptr in dirtied {
            ptr.write().mark_dirty(Some(tid));
        }
        Ok(())
    }

    /// Delete a tuple on behalf of `tid`. The owning table is resolved from
    /// the tuple's record id.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<(), BufferPoolError> {
        let rid = tuple.record_id().ok_or(BufferPoolError::UnstoredTuple)?;
        let file = self.db_file(rid.pid.table_id)?;
        let dirtied = file.delete_tuple(tid, tuple, self)?;

        dirtied.write().mark_dirty(Some(tid));
        Ok(())
    }

    /// Flush every dirty page in the cache. Breaks NO-STEAL if called while
    /// a transaction is active; meant for shutdown and tests.
    pub fn flush_all_pages(&self) -> Result<(), BufferPoolError> {
        let mut cache = self.cache.lock();
        let pids: Vec<PageId> = cache.pages.keys().copied().collect();

        for pid in pids {
            self.flush_page_locked(&mut cache, pid)?;
        }
        Ok(())
    }

    /// Flush every page currently dirtied by `tid`.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<(), BufferPoolError> {
        let mut cache = self.cache.lock();
        let pids: Vec<PageId> = cache
            .pages
            .iter()
            .filter(|(_, ptr)| ptr.read().dirtier() == Some(tid))
            .map(|(&pid, _)| pid)
            .collect();

        for pid in pids {
            self.flush_page_locked(&mut cache, pid)?;
        }
        Ok(())
    }

    /// Drop a page from the cache without flushing it, along with its lock
    /// bookkeeping. Used by recovery to get rid of rolled-back pages.
    pub fn discard_page(&self, pid: PageId) {
        let mut cache = self.cache.lock();
        if cache.pages.remove(&pid).is_some() {
            cache.replacer.remove(pid);
        }
        self.lock_manager.remove_page(pid);
    }

    pub fn cached_pages(&self) -> usize {
        self.cache.lock().pages.len()
    }

    pub fn is_cached(&self, pid: PageId) -> bool {
        self.cache.lock().pages.contains_key(&pid)
    }

    /// Pages dirtied by `tid` that have been flushed to disk so far.
    pub fn flushed_pages(&self, tid: TransactionId) -> HashSet<PageId> {
        self.cache
            .lock()
            .flushed_by_tx
            .get(&tid)
            .cloned()
            .unwrap_or_default()
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    /// Evict the least recently used clean page. NO-STEAL: if every resident
    /// page is dirty there is no victim and the caller's fetch fails.
    fn evict_page(&self, cache: &mut PageCache) -> Result<(), BufferPoolError> {
        let PageCache {
            pages, replacer, ..
        } = cache;

        let victim = replacer.victim_where(|pid| {
            pages.get(&pid).map_or(true, |ptr| !ptr.read().is_dirty())
        });
        let Some(victim) = victim else {
            return Err(BufferPoolError::AllPagesDirty);
        };

        debug!("evicting page {victim}");

        // The victim leaves the cache only once the flush has succeeded.
        if let Err(e) = self.flush_page_locked(cache, victim) {
            cache.replacer.record_access(victim);
            return Err(match e {
                BufferPoolError::Io(source) => BufferPoolError::EvictionIo {
                    pid: victim,
                    source,
                },
                other => other,
            });
        }

        cache.pages.remove(&victim);
        Ok(())
    }

    /// Flush one page if it is cached and dirty: record it in the
    /// dirtied-flushed index, append and force the log record, write the
    /// page through its file, clear the dirty bit. The log force happens
    /// strictly before the page write.
    fn flush_page_locked(
        &self,
        cache: &mut PageCache,
        pid: PageId,
    ) -> Result<(), BufferPoolError> {
        let Some(ptr) = cache.pages.get(&pid).cloned() else {
            return Ok(());
        };

        let mut page = ptr.write();
        let Some(dirtier) = page.dirtier() else {
            return Ok(());
        };

        cache.flushed_by_tx.entry(dirtier).or_default().insert(pid);

        debug!("flushing page {pid} dirtied by {dirtier}");
        self.wal
            .log_write(dirtier, pid, page.before_image(), &page.data)?;
        self.wal.force()?;

        let file = self.db_file(pid.table_id)?;
        file.write_page(&page)?;

        page.mark_dirty(None);
        Ok(())
    }

    fn db_file(&self, table_id: TableId) -> Result<Arc<dyn DbFile>, BufferPoolError> {
        self.catalog
            .db_file(table_id)
            .ok_or(BufferPoolError::UnknownTable(table_id))
    }
}
