use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use serde::{Deserialize, Serialize};

pub mod error;
pub mod page;
pub mod tuple;
pub mod value;

// Common type aliases
pub type TableId = u32;
pub type PageNumber = u32;
pub type SlotId = u16;

// Process-wide defaults, overridable through `BufferPoolConfig`
pub const PAGE_SIZE: usize = 4096;
pub const DEFAULT_PAGES: usize = 50;
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(700);

pub const PAGE_HEADER_SIZE: usize = 16; // checksum(4) | slot_count(2) | free_space_offset(2) | reserved(8)
pub const SLOT_DIRECTORY_ENTRY_SIZE: usize = 4; // offset (2 bytes) + length (2 bytes)
pub const CHECKSUM_SIZE: usize = 4; // CRC32 checksum size

/// Identity of one page: the table it belongs to and its position in that table's file.
///
/// Used by value as the key of both the page cache and the lock table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId {
    pub table_id: TableId,
    pub page_number: PageNumber,
}

impl PageId {
    pub fn new(table_id: TableId, page_number: PageNumber) -> Self {
        Self {
            table_id,
            page_number,
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}:p{}", self.table_id, self.page_number)
    }
}

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Hands out the next identifier from a process-wide counter.
    pub fn new() -> Self {
        Self(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn#{}", self.0)
    }
}

/// A reference to a specific tuple on a specific page of a specific table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: SlotId,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: SlotId) -> Self {
        Self { page_id, slot }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permissions {
    ReadOnly,
    ReadWrite,
}
