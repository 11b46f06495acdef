use std::time::Duration;

use lumbung::{
    BufferPoolConfig, Database, DatabaseError,
    types::{DEFAULT_LOCK_TIMEOUT, DEFAULT_PAGES, PAGE_SIZE},
};

#[test]
fn test_defaults() {
    let config = BufferPoolConfig::default();
    assert_eq!(config.page_size, PAGE_SIZE);
    assert_eq!(config.num_pages, DEFAULT_PAGES);
    assert_eq!(config.lock_timeout, DEFAULT_LOCK_TIMEOUT);
    assert_eq!(config.lock_timeout, Duration::from_millis(700));
    assert!(config.validate().is_ok());
}

#[test]
fn test_builders_override_fields() {
    let config = BufferPoolConfig::default()
        .with_page_size(1024)
        .with_num_pages(3)
        .with_lock_timeout(Duration::from_millis(25));
    assert_eq!(config.page_size, 1024);
    assert_eq!(config.num_pages, 3);
    assert_eq!(config.lock_timeout, Duration::from_millis(25));
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_rejects_unusable_values() {
    let invalid = [
        BufferPoolConfig::default().with_num_pages(0),
        BufferPoolConfig::default().with_page_size(16),
        BufferPoolConfig::default().with_page_size(70_000),
        BufferPoolConfig::default().with_lock_timeout(Duration::ZERO),
    ];
    for config in invalid {
        assert!(
            matches!(config.validate(), Err(DatabaseError::InvalidConfig { .. })),
            "{:?} should be rejected",
            config
        );
    }
}

#[test]
fn test_database_open_validates_config() {
    let result = Database::open(BufferPoolConfig::default().with_num_pages(0));
    assert!(matches!(result, Err(DatabaseError::InvalidConfig { .. })));

    let database = Database::open(BufferPoolConfig::default().with_page_size(512)).unwrap();
    assert_eq!(database.catalog().page_size(), 512);
    assert_eq!(database.pool().capacity(), DEFAULT_PAGES);
}

#[test]
fn test_catalog_rejects_store_with_other_page_size() {
    let database = Database::open(BufferPoolConfig::default()).unwrap();
    let store = std::sync::Arc::new(lumbung::storage::disk::MemoryStore::new(512));
    let result = database.catalog().add_table("odd", store);
    assert!(matches!(result, Err(DatabaseError::InvalidConfig { .. })));
    assert!(database.catalog().table_names().is_empty());
}

#[test]
fn test_from_env_overrides_and_rejects_garbage() {
    use lumbung::storage::config::{ENV_LOCK_TIMEOUT_MS, ENV_NUM_PAGES, ENV_PAGE_SIZE};

    // Only this test touches the LUMBUNG_* variables
    unsafe {
        std::env::set_var(ENV_NUM_PAGES, "12");
        std::env::set_var(ENV_LOCK_TIMEOUT_MS, "250");
        std::env::remove_var(ENV_PAGE_SIZE);
    }
    let config = BufferPoolConfig::from_env().unwrap();
    assert_eq!(config.num_pages, 12);
    assert_eq!(config.lock_timeout, Duration::from_millis(250));
    assert_eq!(config.page_size, PAGE_SIZE);

    unsafe {
        std::env::set_var(ENV_NUM_PAGES, "many");
    }
    let result = BufferPoolConfig::from_env();
    assert!(matches!(result, Err(DatabaseError::InvalidConfig { .. })));

    unsafe {
        std::env::set_var(ENV_NUM_PAGES, "0");
    }
    let result = BufferPoolConfig::from_env();
    assert!(matches!(result, Err(DatabaseError::InvalidConfig { .. })));

    unsafe {
        std::env::remove_var(ENV_NUM_PAGES);
        std::env::remove_var(ENV_LOCK_TIMEOUT_MS);
    }
}
