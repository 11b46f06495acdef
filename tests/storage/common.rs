use std::{sync::Arc, time::Duration};

use lumbung::{
    BufferPool, BufferPoolConfig, Database, DatabaseError, PageId, TransactionId,
    storage::{
        disk::{MemoryStore, PageStore},
        heap_file::HeapFile,
    },
    types::{tuple::Tuple, value::Value},
};

pub const TEST_LOCK_TIMEOUT: Duration = Duration::from_millis(200);

pub fn test_config(num_pages: usize) -> BufferPoolConfig {
    BufferPoolConfig::default()
        .with_num_pages(num_pages)
        .with_lock_timeout(TEST_LOCK_TIMEOUT)
}

/// A database with one in-memory table holding `pages` empty pages.
pub fn memory_database(num_pages: usize, pages: u32) -> (Database, Arc<HeapFile>, Arc<MemoryStore>) {
    let config = test_config(num_pages);
    let database = Database::open(config.clone()).unwrap();
    let store = Arc::new(MemoryStore::new(config.page_size));
    let file = database.catalog().add_table("t", store.clone()).unwrap();
    for _ in 0..pages {
        store.allocate_page().unwrap();
    }
    (database, file, store)
}

pub fn page(file: &HeapFile, page_number: u32) -> PageId {
    file.page_id(page_number)
}

pub fn row(id: i64, name: &str) -> Tuple {
    Tuple::new(vec![Value::Integer(id), Value::Text(name.to_string())])
}

pub fn scan_ids(
    file: &HeapFile,
    pool: &BufferPool,
    tid: TransactionId,
) -> Result<Vec<i64>, DatabaseError> {
    let mut ids = Vec::new();
    for tuple in file.scan(pool, tid) {
        let tuple = tuple?;
        ids.push(tuple.values[0].as_integer().unwrap());
    }
    Ok(ids)
}
