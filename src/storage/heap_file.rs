//! Heap-organized tables: tuples in no particular order spread over the
//! slotted pages of one [`PageStore`].

use std::sync::Arc;

use tracing::debug;

use crate::{
    storage::{
        buffer_pool::{BufferPool, PageRef},
        disk::PageStore,
    },
    types::{
        PageId, Permissions, TableId, TransactionId, error::DatabaseError, page::Page,
        tuple::Tuple,
    },
};

/// What the buffer pool needs from a table's storage format.
///
/// `insert_tuple` and `delete_tuple` fetch their pages through the pool they
/// are handed (taking exclusive locks on the way) and return the pages they
/// modified. The pool does the dirty bookkeeping.
pub trait TableFile: Send + Sync {
    fn table_id(&self) -> TableId;

    fn page_size(&self) -> usize;

    fn num_pages(&self) -> Result<u32, DatabaseError>;

    fn read_page(&self, page_id: PageId) -> Result<Page, DatabaseError>;

    fn write_page(&self, page: &Page) -> Result<(), DatabaseError>;

    /// Makes every page written so far durable.
    fn sync(&self) -> Result<(), DatabaseError>;

    fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageRef>, DatabaseError>;

    fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<PageRef, DatabaseError>;
}

pub struct HeapFile {
    table_id: TableId,
    store: Arc<dyn PageStore>,
}

impl HeapFile {
    pub fn new(table_id: TableId, store: Arc<dyn PageStore>) -> Self {
        Self { table_id, store }
    }

    pub fn page_id(&self, page_number: u32) -> PageId {
        PageId::new(self.table_id, page_number)
    }

    /// Iterates every tuple of the table, reading pages under shared locks
    /// held by `tid`.
    pub fn scan<'a>(&'a self, pool: &'a BufferPool, tid: TransactionId) -> HeapScan<'a> {
        HeapScan {
            file: self,
            pool,
            tid,
            next_page: 0,
            buffered: Vec::new().into_iter(),
            finished: false,
        }
    }

    fn insert_into(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        page_id: PageId,
        tuple: &mut Tuple,
    ) -> Result<PageRef, DatabaseError> {
        let page = pool.get_page(tid, page_id, Permissions::ReadWrite)?;
        page.write().insert_tuple(tuple)?;
        Ok(page)
    }
}

impl TableFile for HeapFile {
    fn table_id(&self) -> TableId {
        self.table_id
    }

    fn page_size(&self) -> usize {
        self.store.page_size()
    }

    fn num_pages(&self) -> Result<u32, DatabaseError> {
        self.store.num_pages()
    }

    fn read_page(&self, page_id: PageId) -> Result<Page, DatabaseError> {
        self.store.read_page(page_id)
    }

    fn write_page(&self, page: &Page) -> Result<(), DatabaseError> {
        self.store.write_page(page)
    }

    fn sync(&self) -> Result<(), DatabaseError> {
        self.store.sync()
    }

    fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageRef>, DatabaseError> {
        let size = tuple.to_bytes()?.len();
        let capacity = Page::max_cell_size(self.page_size());
        if size > capacity {
            return Err(DatabaseError::TupleTooLarge { size, capacity });
        }

        for page_number in 0..self.num_pages()? {
            let page_id = self.page_id(page_number);
            let held_before = pool.holds_lock(tid, page_id);
            let page = pool.get_page(tid, page_id, Permissions::ReadOnly)?;
            let has_room = page.read().can_fit(size);
            if has_room {
                return Ok(vec![self.insert_into(pool, tid, page_id, tuple)?]);
            }
            // Only free space was inspected, so the shared lock can go
            if !held_before {
                pool.release_page(tid, page_id)?;
            }
        }

        let page_number = self.store.allocate_page()?;
        let page_id = self.page_id(page_number);
        debug!(tid = %tid, page = %page_id, "heap file grew by one page");
        Ok(vec![self.insert_into(pool, tid, page_id, tuple)?])
    }

    fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<PageRef, DatabaseError> {
        let record_id = tuple
            .record_id
            .ok_or_else(|| DatabaseError::invariant("cannot delete a tuple without a record id"))?;
        if record_id.page_id.table_id != self.table_id {
            return Err(DatabaseError::invariant(format!(
                "record {:?} does not belong to table {}",
                record_id, self.table_id
            )));
        }
        let page = pool.get_page(tid, record_id.page_id, Permissions::ReadWrite)?;
        page.write().delete_tuple(tuple)?;
        Ok(page)
    }
}

/// Sequential scan over a heap file, one page at a time.
pub struct HeapScan<'a> {
    file: &'a HeapFile,
    pool: &'a BufferPool,
    tid: TransactionId,
    next_page: u32,
    buffered: std::vec::IntoIter<Tuple>,
    finished: bool,
}

impl HeapScan<'_> {
    fn load_next_page(&mut self) -> Result<bool, DatabaseError> {
        if self.next_page >= self.file.num_pages()? {
            return Ok(false);
        }
        let page_id = self.file.page_id(self.next_page);
        self.next_page += 1;
        let page = self.pool.get_page(self.tid, page_id, Permissions::ReadOnly)?;
        let tuples = page.read().tuples()?;
        self.buffered = tuples.into_iter();
        Ok(true)
    }

    pub fn rewind(&mut self) {
        self.next_page = 0;
        self.buffered = Vec::new().into_iter();
        self.finished = false;
    }
}

impl Iterator for HeapScan<'_> {
    type Item = Result<Tuple, DatabaseError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            if let Some(tuple) = self.buffered.next() {
                return Some(Ok(tuple));
            }
            match self.load_next_page() {
                Ok(true) => continue,
                Ok(false) => self.finished = true,
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            }
        }
        None
    }
}
