use std::sync::Arc;

use crate::{
    concurrency::transaction::Transaction,
    storage::{buffer_pool::BufferPool, catalog::Catalog, config::BufferPoolConfig},
    types::error::DatabaseError,
};

/// One catalog plus the buffer pool serving it, built once and passed to
/// every call site that needs page access.
pub struct Database {
    catalog: Arc<Catalog>,
    pool: BufferPool,
}

impl Database {
    pub fn open(config: BufferPoolConfig) -> Result<Self, DatabaseError> {
        let catalog = Arc::new(Catalog::new(config.page_size));
        let pool = BufferPool::new(config, Arc::clone(&catalog))?;
        Ok(Self { catalog, pool })
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn begin(&self) -> Transaction {
        Transaction::begin()
    }
}
