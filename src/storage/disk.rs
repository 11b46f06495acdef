//! Durable page stores: the backend the buffer pool reads pages from and
//! writes committed pages to.

use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use parking_lot::Mutex;
use tracing::debug;

use crate::types::{PageId, PageNumber, error::DatabaseError, page::Page};

/// Page-addressed durable storage for one table.
pub trait PageStore: Send + Sync {
    fn page_size(&self) -> usize;

    fn num_pages(&self) -> Result<u32, DatabaseError>;

    /// Reads page `page_id.page_number`, tagging the result with `page_id`.
    fn read_page(&self, page_id: PageId) -> Result<Page, DatabaseError>;

    fn write_page(&self, page: &Page) -> Result<(), DatabaseError>;

    /// Durably appends an empty page and returns its number.
    fn allocate_page(&self) -> Result<PageNumber, DatabaseError>;

    fn sync(&self) -> Result<(), DatabaseError>;
}

fn check_page_size(expected: usize, page: &Page) -> Result<(), DatabaseError> {
    if page.page_size() != expected {
        return Err(DatabaseError::InvalidPageSize {
            expected,
            actual: page.page_size(),
        });
    }
    Ok(())
}

/// One file per table; page `n` lives at byte offset `n * page_size`.
pub struct FileStore {
    path: PathBuf,
    file: Mutex<File>,
    page_size: usize,
}

impl FileStore {
    pub fn open<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        debug!(path = %path.display(), page_size, "opened page file");
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            page_size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn page_offset(&self, page_number: PageNumber) -> u64 {
        page_number as u64 * self.page_size as u64
    }

    fn pages_in(&self, file: &File) -> Result<u32, DatabaseError> {
        Ok((file.metadata()?.len() / self.page_size as u64) as u32)
    }
}

impl PageStore for FileStore {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn num_pages(&self) -> Result<u32, DatabaseError> {
        let file = self.file.lock();
        self.pages_in(&file)
    }

    fn read_page(&self, page_id: PageId) -> Result<Page, DatabaseError> {
        let mut file = self.file.lock();
        let num_pages = self.pages_in(&file)?;
        if page_id.page_number >= num_pages {
            return Err(DatabaseError::PageNotFound { page_id, num_pages });
        }
        let mut buffer = vec![0u8; self.page_size];
        file.seek(SeekFrom::Start(self.page_offset(page_id.page_number)))?;
        file.read_exact(&mut buffer)?;
        Page::from_bytes(page_id, &buffer)
    }

    fn write_page(&self, page: &Page) -> Result<(), DatabaseError> {
        check_page_size(self.page_size, page)?;
        let mut file = self.file.lock();
        let num_pages = self.pages_in(&file)?;
        // Writing one past the end appends; anything further would leave a hole
        if page.page_id.page_number > num_pages {
            return Err(DatabaseError::PageNotFound {
                page_id: page.page_id,
                num_pages,
            });
        }
        file.seek(SeekFrom::Start(self.page_offset(page.page_id.page_number)))?;
        file.write_all(&page.to_bytes())?;
        file.flush()?;
        Ok(())
    }

    fn allocate_page(&self) -> Result<PageNumber, DatabaseError> {
        let mut file = self.file.lock();
        let page_number = self.pages_in(&file)?;
        let empty = Page::new(PageId::new(0, page_number), self.page_size);
        file.seek(SeekFrom::Start(self.page_offset(page_number)))?;
        file.write_all(&empty.to_bytes())?;
        file.flush()?;
        debug!(path = %self.path.display(), page_number, "allocated page");
        Ok(page_number)
    }

    fn sync(&self) -> Result<(), DatabaseError> {
        let file = self.file.lock();
        file.sync_all()?;
        Ok(())
    }
}

/// Volatile page store for tests and benchmarks. Counts reads, writes and
/// syncs, and can be told to fail reads or writes to exercise error
/// propagation.
pub struct MemoryStore {
    pages: Mutex<Vec<Vec<u8>>>,
    page_size: usize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
    syncs: AtomicUsize,
}

impl MemoryStore {
    pub fn new(page_size: usize) -> Self {
        Self {
            pages: Mutex::new(Vec::new()),
            page_size,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            syncs: AtomicUsize::new(0),
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn sync_count(&self) -> usize {
        self.syncs.load(Ordering::SeqCst)
    }
}

impl PageStore for MemoryStore {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn num_pages(&self) -> Result<u32, DatabaseError> {
        Ok(self.pages.lock().len() as u32)
    }

    fn read_page(&self, page_id: PageId) -> Result<Page, DatabaseError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(io::Error::other("injected read failure").into());
        }
        let pages = self.pages.lock();
        let bytes = pages
            .get(page_id.page_number as usize)
            .ok_or(DatabaseError::PageNotFound {
                page_id,
                num_pages: pages.len() as u32,
            })?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Page::from_bytes(page_id, bytes)
    }

    fn write_page(&self, page: &Page) -> Result<(), DatabaseError> {
        check_page_size(self.page_size, page)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::other("injected write failure").into());
        }
        let mut pages = self.pages.lock();
        let index = page.page_id.page_number as usize;
        match index.cmp(&pages.len()) {
            std::cmp::Ordering::Less => pages[index] = page.to_bytes(),
            std::cmp::Ordering::Equal => pages.push(page.to_bytes()),
            std::cmp::Ordering::Greater => {
                return Err(DatabaseError::PageNotFound {
                    page_id: page.page_id,
                    num_pages: pages.len() as u32,
                });
            }
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn allocate_page(&self) -> Result<PageNumber, DatabaseError> {
        let mut pages = self.pages.lock();
        let page_number = pages.len() as PageNumber;
        pages.push(Page::new(PageId::new(0, page_number), self.page_size).to_bytes());
        Ok(page_number)
    }

    fn sync(&self) -> Result<(), DatabaseError> {
        self.syncs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
