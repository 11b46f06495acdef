//! The page cache shared by all transactions.
//!
//! Every page access, lock request, dirty marking and flush goes through
//! [`BufferPool`]. Eviction is NO-STEAL: only clean pages are ever evicted,
//! so a page dirtied by a running transaction always stays resident until
//! that transaction commits (flush) or aborts (reload from storage).
//!
//! Critical sections:
//! - `state` guards the page map. A fetch, including the storage read and any
//!   eviction it triggers, runs entirely under it.
//! - Lock waits happen with `state` released, inside the lock manager.
//! - `insert_tuple`/`delete_tuple` call into the table file without holding
//!   `state`; the table file re-enters `get_page` for its own pages. `state`
//!   is taken only to apply the returned dirty pages.
//!
//! Lock order is `state` then page latch then lock table. Page latches are
//! never held across a call into the pool.

use std::{collections::HashMap, sync::Arc, time::Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::{
    concurrency::lock_manager::LockManager,
    storage::{catalog::Catalog, config::BufferPoolConfig},
    types::{
        PageId, Permissions, TableId, TransactionId, error::DatabaseError, page::Page,
        tuple::Tuple,
    },
};

/// Shared handle to a resident page. The latch only protects memory; the
/// transaction-level lock must be held through [`BufferPool::get_page`].
pub type PageRef = Arc<RwLock<Page>>;

struct Frame {
    page: PageRef,
    last_access: u64,
}

#[derive(Default)]
struct PoolState {
    frames: HashMap<PageId, Frame>,
    tick: u64,
}

impl PoolState {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn hit(&mut self, page_id: PageId) -> Option<PageRef> {
        let tick = self.next_tick();
        self.frames.get_mut(&page_id).map(|frame| {
            frame.last_access = tick;
            Arc::clone(&frame.page)
        })
    }

    fn install(&mut self, page_id: PageId, page: PageRef) {
        let last_access = self.next_tick();
        self.frames.insert(page_id, Frame { page, last_access });
    }

    fn dirtied_by(&self, tid: TransactionId) -> Vec<PageId> {
        let mut pages: Vec<PageId> = self
            .frames
            .iter()
            .filter(|(_, frame)| frame.page.read().dirtied_by() == Some(tid))
            .map(|(&page_id, _)| page_id)
            .collect();
        pages.sort();
        pages
    }
}

pub struct BufferPool {
    config: BufferPoolConfig,
    catalog: Arc<Catalog>,
    lock_manager: LockManager,
    state: Mutex<PoolState>,
}

impl BufferPool {
    pub fn new(config: BufferPoolConfig, catalog: Arc<Catalog>) -> Result<Self, DatabaseError> {
        config.validate()?;
        if catalog.page_size() != config.page_size {
            return Err(DatabaseError::InvalidConfig {
                details: format!(
                    "catalog page size {} does not match pool page size {}",
                    catalog.page_size(),
                    config.page_size
                ),
            });
        }
        debug!(
            num_pages = config.num_pages,
            page_size = config.page_size,
            lock_timeout = ?config.lock_timeout,
            "buffer pool created"
        );
        Ok(Self {
            config,
            catalog,
            lock_manager: LockManager::new(),
            state: Mutex::new(PoolState::default()),
        })
    }

    pub fn config(&self) -> &BufferPoolConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    pub fn capacity(&self) -> usize {
        self.config.num_pages
    }

    pub fn num_resident(&self) -> usize {
        self.state.lock().frames.len()
    }

    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.state.lock().frames.contains_key(&page_id)
    }

    /// Resident pages currently marked dirty by `tid`.
    pub fn dirtied_pages(&self, tid: TransactionId) -> Vec<PageId> {
        self.state.lock().dirtied_by(tid)
    }

    /// Fetches `page_id` on behalf of `tid` and locks it: shared for
    /// `ReadOnly`, exclusive for `ReadWrite`.
    ///
    /// The lock wait is bounded by the configured timeout, measured from the
    /// start of this call. On timeout the caller gets
    /// [`DatabaseError::TransactionAborted`] and must roll `tid` back.
    pub fn get_page(
        &self,
        tid: TransactionId,
        page_id: PageId,
        permissions: Permissions,
    ) -> Result<PageRef, DatabaseError> {
        let deadline = Instant::now() + self.config.lock_timeout;

        self.fetch(page_id)?;

        match permissions {
            Permissions::ReadOnly => self.lock_manager.acquire_shared(page_id, tid, deadline)?,
            Permissions::ReadWrite => {
                self.lock_manager.acquire_exclusive(page_id, tid, deadline)?
            }
        }

        // The page may have been evicted, or replaced by a writer's copy,
        // while we waited; hand out whatever is resident now.
        self.fetch(page_id)
    }

    fn fetch(&self, page_id: PageId) -> Result<PageRef, DatabaseError> {
        let mut state = self.state.lock();
        if let Some(page) = state.hit(page_id) {
            trace!(page = %page_id, "buffer pool hit");
            return Ok(page);
        }

        let page = self.catalog.table(page_id.table_id)?.read_page(page_id)?;
        if state.frames.len() >= self.config.num_pages {
            self.evict_page(&mut state)?;
        }
        let page = Arc::new(RwLock::new(page));
        state.install(page_id, Arc::clone(&page));
        debug!(page = %page_id, resident = state.frames.len(), "buffer pool miss, page loaded");
        Ok(page)
    }

    /// Drops `tid`'s lock on `page_id` right away, before the transaction ends.
    /// Only safe when `tid` will not touch the page again under that lock.
    pub fn release_page(&self, tid: TransactionId, page_id: PageId) -> Result<(), DatabaseError> {
        if !self.lock_manager.release(page_id, tid) {
            return Err(DatabaseError::invariant(format!(
                "{} released page {} without holding a lock on it",
                tid, page_id
            )));
        }
        trace!(tid = %tid, page = %page_id, "page lock released early");
        Ok(())
    }

    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.lock_manager.holds_lock(page_id, tid)
    }

    /// Inserts `tuple` into table `table_id` and marks every page the table
    /// file modified as dirtied by `tid`. On success the tuple carries its new
    /// record id.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> Result<(), DatabaseError> {
        let file = self.catalog.table(table_id)?;
        let dirtied = file.insert_tuple(self, tid, tuple)?;
        self.apply_dirtied(tid, dirtied)
    }

    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<(), DatabaseError> {
        let record_id = tuple
            .record_id
            .ok_or_else(|| DatabaseError::invariant("cannot delete a tuple without a record id"))?;
        let file = self.catalog.table(record_id.page_id.table_id)?;
        let dirtied = file.delete_tuple(self, tid, tuple)?;
        self.apply_dirtied(tid, vec![dirtied])
    }

    fn apply_dirtied(&self, tid: TransactionId, pages: Vec<PageRef>) -> Result<(), DatabaseError> {
        let mut state = self.state.lock();
        for page in pages {
            let page_id = page.read().page_id;
            if !self.lock_manager.has_exclusive(page_id, tid) {
                return Err(DatabaseError::invariant(format!(
                    "{} modified page {} without an exclusive lock",
                    tid, page_id
                )));
            }
            page.write().mark_dirty(tid);

            let resident_is_ours = state
                .frames
                .get(&page_id)
                .is_some_and(|frame| Arc::ptr_eq(&frame.page, &page));
            if resident_is_ours {
                state.hit(page_id);
                continue;
            }
            if !state.frames.contains_key(&page_id) && state.frames.len() >= self.config.num_pages {
                self.evict_page(&mut state)?;
            }
            state.install(page_id, page);
            trace!(tid = %tid, page = %page_id, "installed dirtied page");
        }
        Ok(())
    }

    /// Commits (`commit = true`) or aborts `tid`, then releases all its locks.
    ///
    /// Commit writes every page dirtied by `tid` and marks it clean. If a write
    /// fails, the error is returned and the locks stay held so the caller can
    /// still abort. Pages written before the failure are already durable and
    /// clean, so a later abort only reverts the pages that were not written.
    /// Abort reloads those pages from storage in place, and always releases
    /// the locks.
    pub fn transaction_complete(
        &self,
        tid: TransactionId,
        commit: bool,
    ) -> Result<(), DatabaseError> {
        if commit {
            self.flush_pages(tid)?;
            let released = self.lock_manager.release_all(tid);
            debug!(tid = %tid, locks = released.len(), "transaction committed");
            Ok(())
        } else {
            let reverted = self.revert_pages(tid);
            let released = self.lock_manager.release_all(tid);
            debug!(tid = %tid, locks = released.len(), "transaction aborted");
            reverted
        }
    }

    fn revert_pages(&self, tid: TransactionId) -> Result<(), DatabaseError> {
        let mut state = self.state.lock();
        let mut first_error = None;
        for page_id in state.dirtied_by(tid) {
            let fresh = self
                .catalog
                .table(page_id.table_id)
                .and_then(|file| file.read_page(page_id));
            match fresh {
                Ok(fresh) => {
                    if let Some(frame) = state.frames.get(&page_id) {
                        *frame.page.write() = fresh;
                    }
                    debug!(tid = %tid, page = %page_id, "page reloaded from storage");
                }
                Err(err) => {
                    // Storage still holds the last committed image; dropping
                    // the dirty copy is enough to roll it back.
                    state.frames.remove(&page_id);
                    warn!(tid = %tid, page = %page_id, error = %err, "reload failed, page discarded");
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Writes every page dirtied by `tid` and marks it clean.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<(), DatabaseError> {
        let state = self.state.lock();
        for page_id in state.dirtied_by(tid) {
            self.flush_frame(&state, page_id)?;
        }
        Ok(())
    }

    /// Writes `page_id` if it is resident and dirty. Returns whether a write
    /// happened.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool, DatabaseError> {
        let state = self.state.lock();
        self.flush_frame(&state, page_id)
    }

    /// Writes every dirty resident page and syncs the tables written to.
    /// Meant for shutdown and checkpoints only: once uncommitted pages reach
    /// storage, abort can no longer undo them.
    pub fn flush_all_pages(&self) -> Result<(), DatabaseError> {
        let state = self.state.lock();
        let mut page_ids: Vec<PageId> = state.frames.keys().copied().collect();
        page_ids.sort();

        let mut written: Vec<TableId> = Vec::new();
        for page_id in page_ids {
            if self.flush_frame(&state, page_id)? && !written.contains(&page_id.table_id) {
                written.push(page_id.table_id);
            }
        }
        for &table_id in &written {
            self.catalog.table(table_id)?.sync()?;
        }
        debug!(resident = state.frames.len(), tables = written.len(), "flushed all pages");
        Ok(())
    }

    /// Drops a page from the cache without writing it. Returns whether it was
    /// resident.
    pub fn discard_page(&self, page_id: PageId) -> bool {
        let discarded = self.state.lock().frames.remove(&page_id).is_some();
        if discarded {
            debug!(page = %page_id, "page discarded");
        }
        discarded
    }

    fn flush_frame(&self, state: &PoolState, page_id: PageId) -> Result<bool, DatabaseError> {
        let Some(frame) = state.frames.get(&page_id) else {
            return Ok(false);
        };
        let mut page = frame.page.write();
        if !page.is_dirty() {
            return Ok(false);
        }
        self.catalog.table(page_id.table_id)?.write_page(&page)?;
        page.mark_clean();
        trace!(page = %page_id, "page written");
        Ok(true)
    }

    /// Evicts the least recently used clean page.
    fn evict_page(&self, state: &mut PoolState) -> Result<(), DatabaseError> {
        let victim = state
            .frames
            .iter()
            .filter(|(_, frame)| !frame.page.read().is_dirty())
            .min_by_key(|(_, frame)| frame.last_access)
            .map(|(&page_id, _)| page_id);

        let Some(victim) = victim else {
            warn!(capacity = self.config.num_pages, "every resident page is dirty");
            return Err(DatabaseError::BufferPoolExhausted {
                capacity: self.config.num_pages,
            });
        };

        state.frames.remove(&victim);
        debug!(page = %victim, "evicted page");
        Ok(())
    }
}
