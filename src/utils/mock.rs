use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tempfile::{Builder, TempDir};

use crate::{
    database::Database,
    storage::{
        buffer_pool::BufferPool, catalog::Catalog, config::BufferPoolConfig, heap_file::HeapFile,
    },
    types::error::DatabaseError,
};

/// A database whose table files live in a temporary directory that is
/// removed on drop.
pub struct TempDatabase {
    dir: TempDir,
    database: Database,
}

impl TempDatabase {
    pub fn new() -> Result<Self, DatabaseError> {
        Self::with_config("lumbung_test", BufferPoolConfig::default())
    }

    pub fn with_prefix(prefix: &str) -> Result<Self, DatabaseError> {
        Self::with_config(prefix, BufferPoolConfig::default())
    }

    pub fn with_config(prefix: &str, config: BufferPoolConfig) -> Result<Self, DatabaseError> {
        let dir = Builder::new().prefix(prefix).tempdir()?;
        let database = Database::open(config)?;
        Ok(Self { dir, database })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn table_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(format!("{}.dat", name))
    }

    /// Creates a file-backed table inside the temporary directory.
    pub fn create_table(&self, name: &str) -> Result<Arc<HeapFile>, DatabaseError> {
        self.database
            .catalog()
            .create_table(name, self.table_path(name))
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn pool(&self) -> &BufferPool {
        self.database.pool()
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        self.database.catalog()
    }
}
