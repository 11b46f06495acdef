//! Page-granular shared/exclusive locks for strict two-phase locking.
//!
//! There is no waits-for graph. A request that cannot be granted waits on a
//! condition variable until either a holder releases or the caller's deadline
//! passes, at which point the caller gets a [`LockTimeout`] and must abort.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tracing::{trace, warn};

use crate::types::{PageId, TransactionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// A lock request ran past its deadline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{tid} gave up on a {mode:?} lock for page {page_id} after {waited:?}")]
pub struct LockTimeout {
    pub tid: TransactionId,
    pub page_id: PageId,
    pub mode: LockMode,
    pub waited: Duration,
}

#[derive(Debug, Default)]
struct LockTable {
    shared: HashMap<PageId, HashSet<TransactionId>>,
    exclusive: HashMap<PageId, TransactionId>,
}

impl LockTable {
    fn has_exclusive(&self, page_id: PageId, tid: TransactionId) -> bool {
        self.exclusive.get(&page_id) == Some(&tid)
    }

    fn has_shared(&self, page_id: PageId, tid: TransactionId) -> bool {
        self.shared
            .get(&page_id)
            .is_some_and(|holders| holders.contains(&tid))
    }

    fn is_upgradable(&self, page_id: PageId, tid: TransactionId) -> bool {
        self.shared
            .get(&page_id)
            .is_some_and(|holders| holders.len() == 1 && holders.contains(&tid))
    }

    fn try_grant(&mut self, page_id: PageId, tid: TransactionId, mode: LockMode) -> bool {
        match mode {
            LockMode::Shared => self.try_shared(page_id, tid),
            LockMode::Exclusive => self.try_exclusive(page_id, tid),
        }
    }

    fn try_shared(&mut self, page_id: PageId, tid: TransactionId) -> bool {
        // Our own exclusive hold does not block a shared request
        if let Some(&holder) = self.exclusive.get(&page_id) {
            if holder != tid {
                return false;
            }
        }
        self.shared.entry(page_id).or_default().insert(tid);
        true
    }

    fn try_exclusive(&mut self, page_id: PageId, tid: TransactionId) -> bool {
        if self.has_exclusive(page_id, tid) {
            return true;
        }
        if self.is_upgradable(page_id, tid) {
            // Sole reader becomes the writer without an unlocked window
            self.shared.remove(&page_id);
            self.exclusive.insert(page_id, tid);
            return true;
        }
        if !self.shared.contains_key(&page_id) && !self.exclusive.contains_key(&page_id) {
            self.exclusive.insert(page_id, tid);
            return true;
        }
        false
    }

    fn release(&mut self, page_id: PageId, tid: TransactionId) -> bool {
        let mut released = false;
        if self.has_exclusive(page_id, tid) {
            self.exclusive.remove(&page_id);
            released = true;
        }
        if let Some(holders) = self.shared.get_mut(&page_id) {
            released |= holders.remove(&tid);
            if holders.is_empty() {
                self.shared.remove(&page_id);
            }
        }
        released
    }
}

/// Lock table shared by every transaction using one buffer pool.
#[derive(Debug, Default)]
pub struct LockManager {
    table: Mutex<LockTable>,
    released: Condvar,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_exclusive(&self, page_id: PageId, tid: TransactionId) -> bool {
        self.table.lock().has_exclusive(page_id, tid)
    }

    pub fn has_shared(&self, page_id: PageId, tid: TransactionId) -> bool {
        self.table.lock().has_shared(page_id, tid)
    }

    /// True when `tid` is the only shared holder and may upgrade without waiting.
    pub fn is_upgradable(&self, page_id: PageId, tid: TransactionId) -> bool {
        self.table.lock().is_upgradable(page_id, tid)
    }

    pub fn holds_lock(&self, page_id: PageId, tid: TransactionId) -> bool {
        let table = self.table.lock();
        table.has_shared(page_id, tid) || table.has_exclusive(page_id, tid)
    }

    pub fn acquire_shared(
        &self,
        page_id: PageId,
        tid: TransactionId,
        deadline: Instant,
    ) -> Result<(), LockTimeout> {
        self.acquire(page_id, tid, LockMode::Shared, deadline)
    }

    pub fn acquire_exclusive(
        &self,
        page_id: PageId,
        tid: TransactionId,
        deadline: Instant,
    ) -> Result<(), LockTimeout> {
        self.acquire(page_id, tid, LockMode::Exclusive, deadline)
    }

    pub fn acquire(
        &self,
        page_id: PageId,
        tid: TransactionId,
        mode: LockMode,
        deadline: Instant,
    ) -> Result<(), LockTimeout> {
        let started = Instant::now();
        let mut table = self.table.lock();
        loop {
            if table.try_grant(page_id, tid, mode) {
                trace!(tid = %tid, page = %page_id, ?mode, "lock granted");
                return Ok(());
            }
            if self.released.wait_until(&mut table, deadline).timed_out() {
                // A release may have landed right at the deadline
                if table.try_grant(page_id, tid, mode) {
                    trace!(tid = %tid, page = %page_id, ?mode, "lock granted at deadline");
                    return Ok(());
                }
                let waited = started.elapsed();
                warn!(tid = %tid, page = %page_id, ?mode, ?waited, "lock wait timed out");
                return Err(LockTimeout {
                    tid,
                    page_id,
                    mode,
                    waited,
                });
            }
        }
    }

    /// Drops whatever `tid` holds on `page_id`. Releasing a lock that is not
    /// held is a no-op; the return value says whether anything was released.
    pub fn release(&self, page_id: PageId, tid: TransactionId) -> bool {
        let released = self.table.lock().release(page_id, tid);
        if released {
            self.released.notify_all();
        }
        released
    }

    /// Releases every lock held by `tid` and returns the affected pages.
    pub fn release_all(&self, tid: TransactionId) -> Vec<PageId> {
        let mut table = self.table.lock();
        let pages = Self::pages_of(&table, tid);
        for &page_id in &pages {
            table.release(page_id, tid);
        }
        drop(table);

        if !pages.is_empty() {
            self.released.notify_all();
        }
        pages
    }

    /// Pages on which `tid` holds any lock, in page order.
    pub fn locked_pages(&self, tid: TransactionId) -> Vec<PageId> {
        Self::pages_of(&self.table.lock(), tid)
    }

    pub fn shared_holders(&self, page_id: PageId) -> Vec<TransactionId> {
        let mut holders: Vec<TransactionId> = self
            .table
            .lock()
            .shared
            .get(&page_id)
            .map(|holders| holders.iter().copied().collect())
            .unwrap_or_default();
        holders.sort();
        holders
    }

    pub fn exclusive_holder(&self, page_id: PageId) -> Option<TransactionId> {
        self.table.lock().exclusive.get(&page_id).copied()
    }

    fn pages_of(table: &LockTable, tid: TransactionId) -> Vec<PageId> {
        let mut pages: Vec<PageId> = table
            .shared
            .iter()
            .filter(|(_, holders)| holders.contains(&tid))
            .map(|(&page_id, _)| page_id)
            .chain(
                table
                    .exclusive
                    .iter()
                    .filter(|(_, holder)| **holder == tid)
                    .map(|(&page_id, _)| page_id),
            )
            .collect();
        pages.sort();
        pages.dedup();
        pages
    }
}
