use thiserror::Error;

use crate::{
    concurrency::lock_manager::LockTimeout,
    types::{PageId, TableId},
};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transaction aborted: {0}")]
    TransactionAborted(#[from] LockTimeout),

    #[error("Buffer pool exhausted: all {capacity} resident pages are dirty")]
    BufferPoolExhausted { capacity: usize },

    #[error("Invariant violation: {details}")]
    InvariantViolation { details: String },

    #[error("Page {page_id} not found (table has {num_pages} pages)")]
    PageNotFound { page_id: PageId, num_pages: u32 },

    #[error("Page is full (page_id: {page_id})")]
    PageFull { page_id: PageId },

    #[error("Invalid slot index {index} (max: {max})")]
    InvalidSlotIndex { index: usize, max: usize },

    #[error("Tuple of {size} bytes does not fit in an empty page ({capacity} bytes usable)")]
    TupleTooLarge { size: usize, capacity: usize },

    #[error("No tuple at slot {slot} of page {page_id}")]
    TupleNotFound { page_id: PageId, slot: u16 },

    #[error("Serialization/deserialization error: {details}")]
    SerializationError { details: String },

    #[error("Table {table_id} not found")]
    TableNotFound { table_id: TableId },

    #[error("Invalid page size: {expected} bytes, got {actual} bytes")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("Corrupted page: page_id={page_id}, reason={reason}")]
    CorruptedPage { page_id: PageId, reason: String },

    #[error("Invalid configuration: {details}")]
    InvalidConfig { details: String },
}

impl DatabaseError {
    /// True when a lock could not be granted in time.
    pub fn is_transaction_abort(&self) -> bool {
        matches!(self, DatabaseError::TransactionAborted(_))
    }

    /// True when the transaction that observed this error must be rolled back
    /// before its identifier is used again.
    pub fn requires_rollback(&self) -> bool {
        matches!(
            self,
            DatabaseError::TransactionAborted(_)
                | DatabaseError::BufferPoolExhausted { .. }
                | DatabaseError::Io(_)
                | DatabaseError::PageNotFound { .. }
                | DatabaseError::CorruptedPage { .. }
                | DatabaseError::InvalidPageSize { .. }
        )
    }

    pub(crate) fn invariant(details: impl Into<String>) -> Self {
        DatabaseError::InvariantViolation {
            details: details.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DatabaseError>;
