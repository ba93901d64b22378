use std::collections::{HashMap, HashSet};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

use log::warn;
use parking_lot::Mutex;
use rand::Rng;

use crate::common::types::{PageId, Permission, TransactionId};
use crate::transaction::concurrency::TransactionError;

/// Sleep between grant attempts for a transaction already holding locks (ms).
const BLOCK_DELAY_SHORT: u64 = 10;
/// Sleep between grant attempts for a transaction holding nothing yet (ms).
const BLOCK_DELAY_LONG: u64 = 100;
/// Wait budget before a fresh transaction gives up (ms).
const MAX_TRIES_SMALL: u64 = 250;
/// Wait budget before an established transaction gives up (ms).
const MAX_TRIES_LARGE: u64 = 500;
/// Random jitter added to every sleep (ms).
const RAND_RANGE: u64 = 10;

#[derive(Default)]
struct LockState {
    read_holders: HashMap<PageId, HashSet<TransactionId>>,
    write_holder: HashMap<PageId, TransactionId>,
    shared_by_tx: HashMap<TransactionId, HashSet<PageId>>,
    exclusive_by_tx: HashMap<TransactionId, HashSet<PageId>>,
    tx_thread: HashMap<TransactionId, Thread>,
    interrupted: HashSet<TransactionId>,
}

impl LockState {
    fn add_lock(&mut self, tid: TransactionId, pid: PageId, perm: Permission) {
        if perm == Permission::ReadOnly {
            self.read_holders.entry(pid).or_default().insert(tid);
            self.shared_by_tx.entry(tid).or_default().insert(pid);
            return;
        }
        self.write_holder.insert(pid, tid);
        self.exclusive_by_tx.entry(tid).or_default().insert(pid);
    }

    /// Kick every other reader off the page: clear the read-holder set and
    /// wake their registered threads so they observe the abort. Their
    /// `shared_by_tx` entries stay behind until they release, which is why
    /// `holds_lock` consults the primary maps only.
    fn abort_read_holders(&mut self, requesting: TransactionId, pid: PageId) {
        let Some(readers) = self.read_holders.get_mut(&pid) else {
            return;
        };
        let victims: Vec<TransactionId> = readers
            .iter()
            .copied()
            .filter(|tid| *tid != requesting)
            .collect();
        readers.clear();

        for tid in victims {
            warn!("{requesting} preempting reader {tid} on page {pid}");
            self.interrupted.insert(tid);
            if let Some(handle) = self.tx_thread.get(&tid) {
                handle.unpark();
            }
        }
    }

    /// The grant decision, taken atomically under the manager's mutex. The
    /// rules are evaluated in a fixed order; `force` is only set by a writer
    /// whose wait budget ran out.
    fn grant(&mut self, tid: TransactionId, pid: PageId, perm: Permission, force: bool) -> bool {
        let no_readers = self.read_holders.get(&pid).map_or(true, HashSet::is_empty);
        let writer = self.write_holder.get(&pid).copied();

        // Unlocked page: grant anything.
        if no_readers && writer.is_none() {
            self.add_lock(tid, pid, perm);
            return true;
        }

        // Shared request: fine unless somebody else holds the write lock.
        if perm == Permission::ReadOnly {
            if writer.is_some() && writer != Some(tid) {
                return false;
            }
            self.add_lock(tid, pid, perm);
            return true;
        }

        // Exclusive request by the page's sole reader: implicit upgrade.
        let sole_reader = self
            .read_holders
            .get(&pid)
            .map_or(false, |readers| readers.len() == 1 && readers.contains(&tid));
        if sole_reader {
            self.add_lock(tid, pid, perm);
            return true;
        }

        // Already the writer.
        if writer == Some(tid) {
            return true;
        }

        // Forced acquisition: a timed-out writer may preempt the readers,
        // provided no writer is installed.
        if force && writer.is_none() {
            self.abort_read_holders(tid, pid);
            self.add_lock(tid, pid, perm);
            return true;
        }

        false
    }
}

/// Page-granularity shared/exclusive locks with blocking acquisition.
///
/// Deadlocks are broken by timeout: a reader that waits out its budget
/// aborts; a writer that waits out its budget forcibly preempts the readers
/// of the page it wants.
#[derive(Default)]
pub struct LockManager {
    state: Mutex<LockState>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// One synchronous grant attempt. Returns true iff the lock was granted
    /// (or was already held with sufficient strength).
    pub fn grant_lock(&self, tid: TransactionId, pid: PageId, perm: Permission) -> bool {
        self.state.lock().grant(tid, pid, perm, false)
    }

    /// Acquire `perm` on `pid`, blocking until granted or the transaction is
    /// aborted by timeout or preemption.
    pub fn request_lock(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permission,
    ) -> Result<(), TransactionError> {
        let (block_delay, budget) = {
            let mut state = self.state.lock();
            let established = state.shared_by_tx.contains_key(&tid)
                || state.exclusive_by_tx.contains_key(&tid);

            state.tx_thread.entry(tid).or_insert_with(thread::current);

            if state.grant(tid, pid, perm, false) {
                return Ok(());
            }

            if established {
                (BLOCK_DELAY_SHORT, MAX_TRIES_LARGE)
            } else {
                (BLOCK_DELAY_LONG, MAX_TRIES_SMALL)
            }
        };

        let mut rng = rand::thread_rng();
        let mut start = Instant::now();

        loop {
            if start.elapsed() > Duration::from_millis(budget) {
                if perm == Permission::ReadOnly {
                    let mut state = self.state.lock();
                    state.tx_thread.remove(&tid);
                    warn!("{tid} timed out waiting for a shared lock on page {pid}");
                    return Err(TransactionError::LockTimeout(tid, pid));
                }

                // A timed-out writer retries with force, which lets it clear
                // the page's readers; the wait clock restarts either way.
                let granted = self.state.lock().grant(tid, pid, perm, true);
                if granted {
                    return Ok(());
                }
                start = Instant::now();
                continue;
            }

            let jitter = rng.gen_range(0..RAND_RANGE);
            thread::park_timeout(Duration::from_millis(block_delay + jitter));

            let mut state = self.state.lock();
            if state.interrupted.remove(&tid) {
                state.tx_thread.remove(&tid);
                return Err(TransactionError::Preempted(tid, pid));
            }
            if state.grant(tid, pid, perm, false) {
                return Ok(());
            }
        }
    }

    /// Release whatever lock `tid` holds on `pid`.
    pub fn release_lock(&self, tid: TransactionId, pid: PageId) {
        let mut state = self.state.lock();
        if let Some(readers) = state.read_holders.get_mut(&pid) {
            readers.remove(&tid);
        }
        if state.write_holder.get(&pid) == Some(&tid) {
            state.write_holder.remove(&pid);
        }
        if let Some(pages) = state.shared_by_tx.get_mut(&tid) {
            pages.remove(&pid);
        }
        if let Some(pages) = state.exclusive_by_tx.get_mut(&tid) {
            pages.remove(&pid);
        }
    }

    /// Release every lock `tid` holds and end its bookkeeping.
    pub fn release_all_pages(&self, tid: TransactionId) {
        let mut state = self.state.lock();

        if let Some(pids) = state.shared_by_tx.remove(&tid) {
            for pid in pids {
                if let Some(readers) = state.read_holders.get_mut(&pid) {
                    readers.remove(&tid);
                }
            }
        }
        if let Some(pids) = state.exclusive_by_tx.remove(&tid) {
            for pid in pids {
                if state.write_holder.get(&pid) == Some(&tid) {
                    state.write_holder.remove(&pid);
                }
            }
        }

        state.tx_thread.remove(&tid);
        state.interrupted.remove(&tid);
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        let state = self.state.lock();
        if state
            .read_holders
            .get(&pid)
            .map_or(false, |readers| readers.contains(&tid))
        {
            return true;
        }
        state.write_holder.get(&pid) == Some(&tid)
    }

    /// Drop all lock bookkeeping for a page the buffer pool has discarded.
    pub fn remove_page(&self, pid: PageId) {
        let mut state = self.state.lock();
        state.read_holders.remove(&pid);
        state.write_holder.remove(&pid);
    }
}
