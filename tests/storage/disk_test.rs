use std::fs;

use lumbung::{
    DatabaseError, PageId,
    storage::disk::{FileStore, MemoryStore, PageStore},
    types::{PAGE_SIZE, page::Page, tuple::Tuple, value::Value},
};
use tempfile::tempdir;

fn page_with_row(page_id: PageId, page_size: usize, id: i64) -> Page {
    let mut page = Page::new(page_id, page_size);
    let mut tuple = Tuple::new(vec![Value::Integer(id), Value::from("stored")]);
    page.insert_tuple(&mut tuple).unwrap();
    page
}

#[test]
fn test_file_store_allocate_write_read() -> Result<(), DatabaseError> {
    let dir = tempdir()?;
    let store = FileStore::open(dir.path().join("table.dat"), PAGE_SIZE)?;
    assert_eq!(store.num_pages()?, 0);

    assert_eq!(store.allocate_page()?, 0);
    assert_eq!(store.allocate_page()?, 1);
    assert_eq!(store.num_pages()?, 2);

    let page_id = PageId::new(7, 1);
    store.write_page(&page_with_row(page_id, PAGE_SIZE, 42))?;
    store.sync()?;

    let read = store.read_page(page_id)?;
    assert_eq!(read.page_id, page_id);
    assert_eq!(read.tuples()?[0].values[0], Value::Integer(42));
    assert!(!read.is_dirty());

    let empty = store.read_page(PageId::new(7, 0))?;
    assert_eq!(empty.num_tuples(), 0);
    Ok(())
}

#[test]
fn test_file_store_bounds() -> Result<(), DatabaseError> {
    let dir = tempdir()?;
    let store = FileStore::open(dir.path().join("table.dat"), PAGE_SIZE)?;

    match store.read_page(PageId::new(1, 0)) {
        Err(DatabaseError::PageNotFound { num_pages, .. }) => assert_eq!(num_pages, 0),
        other => panic!("Expected PageNotFound, got {:?}", other),
    }

    // Writing exactly one past the end appends
    store.write_page(&Page::new(PageId::new(1, 0), PAGE_SIZE))?;
    assert_eq!(store.num_pages()?, 1);

    let result = store.write_page(&Page::new(PageId::new(1, 5), PAGE_SIZE));
    assert!(matches!(result, Err(DatabaseError::PageNotFound { .. })));

    let result = store.write_page(&Page::new(PageId::new(1, 0), 512));
    assert!(matches!(
        result,
        Err(DatabaseError::InvalidPageSize { expected: PAGE_SIZE, actual: 512 })
    ));
    Ok(())
}

#[test]
fn test_file_store_detects_corruption() -> Result<(), DatabaseError> {
    let dir = tempdir()?;
    let path = dir.path().join("table.dat");
    let store = FileStore::open(&path, PAGE_SIZE)?;
    store.allocate_page()?;
    store.write_page(&page_with_row(PageId::new(1, 0), PAGE_SIZE, 1))?;
    drop(store);

    let mut bytes = fs::read(&path)?;
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&path, &bytes)?;

    let store = FileStore::open(&path, PAGE_SIZE)?;
    assert_eq!(store.path(), path.as_path());
    let result = store.read_page(PageId::new(1, 0));
    assert!(matches!(result, Err(DatabaseError::CorruptedPage { .. })));
    Ok(())
}

#[test]
fn test_memory_store_counts_and_fails_on_demand() -> Result<(), DatabaseError> {
    let store = MemoryStore::new(256);
    let page_id = PageId::new(3, 0);
    store.allocate_page()?;

    store.write_page(&page_with_row(page_id, 256, 9))?;
    assert_eq!(store.write_count(), 1);
    assert_eq!(store.read_page(page_id)?.num_tuples(), 1);
    assert_eq!(store.read_count(), 1);

    store.set_fail_writes(true);
    let result = store.write_page(&Page::new(page_id, 256));
    assert!(matches!(result, Err(DatabaseError::Io(_))));
    assert_eq!(store.write_count(), 1);
    assert_eq!(store.read_page(page_id)?.num_tuples(), 1);

    store.set_fail_writes(false);
    store.write_page(&Page::new(page_id, 256))?;
    assert_eq!(store.read_page(page_id)?.num_tuples(), 0);
    Ok(())
}

#[test]
fn test_memory_store_missing_page() {
    let store = MemoryStore::new(256);
    let result = store.read_page(PageId::new(3, 2));
    assert!(matches!(result, Err(DatabaseError::PageNotFound { .. })));
    assert_eq!(store.read_count(), 0);
}
