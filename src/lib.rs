//! Page cache and strict two-phase locking core of a disk-backed relational
//! engine.
//!
//! The [`BufferPool`](storage::buffer_pool::BufferPool) owns every resident
//! page and the [`LockManager`](concurrency::lock_manager::LockManager).
//! Eviction is NO-STEAL, so aborting a transaction only needs to re-read the
//! pages it dirtied.

pub mod concurrency;
pub mod database;
pub mod storage;
pub mod types;
pub mod utils;

pub use database::Database;
pub use storage::buffer_pool::{BufferPool, PageRef};
pub use storage::config::BufferPoolConfig;
pub use types::error::{DatabaseError, Result};
pub use types::{PageId, Permissions, RecordId, TransactionId};
