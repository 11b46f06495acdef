use std::{
    collections::HashMap,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
};

use parking_lot::RwLock;
use tracing::debug;

use crate::{
    storage::{
        disk::{FileStore, MemoryStore, PageStore},
        heap_file::{HeapFile, TableFile},
    },
    types::{TableId, error::DatabaseError},
};

#[derive(Default)]
struct Tables {
    by_id: HashMap<TableId, Arc<dyn TableFile>>,
    by_name: HashMap<String, TableId>,
}

/// Registry of the tables a buffer pool can fetch pages for.
///
/// Table ids are handed out sequentially; they are never derived from names
/// or paths, so two tables cannot alias each other.
pub struct Catalog {
    page_size: usize,
    tables: RwLock<Tables>,
    next_table_id: AtomicU32,
}

impl Catalog {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            tables: RwLock::new(Tables::default()),
            next_table_id: AtomicU32::new(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Opens (or creates) a file-backed heap table.
    pub fn create_table<P: AsRef<Path>>(
        &self,
        name: &str,
        path: P,
    ) -> Result<Arc<HeapFile>, DatabaseError> {
        let store = FileStore::open(path, self.page_size)?;
        self.add_table(name, Arc::new(store))
    }

    pub fn create_memory_table(&self, name: &str) -> Result<Arc<HeapFile>, DatabaseError> {
        self.add_table(name, Arc::new(MemoryStore::new(self.page_size)))
    }

    /// Registers a table over `store`. A table already registered under the
    /// same name is replaced.
    pub fn add_table(
        &self,
        name: &str,
        store: Arc<dyn PageStore>,
    ) -> Result<Arc<HeapFile>, DatabaseError> {
        if store.page_size() != self.page_size {
            return Err(DatabaseError::InvalidConfig {
                details: format!(
                    "table '{}' uses {}-byte pages but the catalog uses {}-byte pages",
                    name,
                    store.page_size(),
                    self.page_size
                ),
            });
        }

        let table_id = self.assign_table_id();
        let file = Arc::new(HeapFile::new(table_id, store));
        self.install(name, table_id, Arc::clone(&file) as Arc<dyn TableFile>);
        Ok(file)
    }

    /// Registers a table with a caller-supplied storage format. `build`
    /// receives the freshly assigned id. A table already registered under
    /// the same name is replaced.
    pub fn register_table<F>(&self, name: &str, build: F) -> TableId
    where
        F: FnOnce(TableId) -> Arc<dyn TableFile>,
    {
        let table_id = self.assign_table_id();
        self.install(name, table_id, build(table_id));
        table_id
    }

    fn assign_table_id(&self) -> TableId {
        self.next_table_id.fetch_add(1, Ordering::Relaxed)
    }

    fn install(&self, name: &str, table_id: TableId, file: Arc<dyn TableFile>) {
        let mut tables = self.tables.write();
        if let Some(old_id) = tables.by_name.insert(name.to_string(), table_id) {
            tables.by_id.remove(&old_id);
            debug!(table = name, old_id, "replaced table");
        }
        tables.by_id.insert(table_id, file);
        debug!(table = name, table_id, "registered table");
    }

    pub fn table(&self, table_id: TableId) -> Result<Arc<dyn TableFile>, DatabaseError> {
        self.tables
            .read()
            .by_id
            .get(&table_id)
            .map(Arc::clone)
            .ok_or(DatabaseError::TableNotFound { table_id })
    }

    pub fn table_id(&self, name: &str) -> Option<TableId> {
        self.tables.read().by_name.get(name).copied()
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().by_name.keys().cloned().collect();
        names.sort();
        names
    }
}
