use lumbung::{
    DatabaseError, PageId, RecordId, TransactionId,
    types::{
        PAGE_HEADER_SIZE, PAGE_SIZE, SLOT_DIRECTORY_ENTRY_SIZE, page::Page, tuple::Tuple,
        value::Value,
    },
};

fn page_id() -> PageId {
    PageId::new(1, 0)
}

fn tuple(id: i64, name: &str) -> Tuple {
    Tuple::new(vec![Value::Integer(id), Value::from(name)])
}

#[test]
fn test_new_page_is_empty() {
    let page = Page::new(page_id(), PAGE_SIZE);
    assert_eq!(page.page_size(), PAGE_SIZE);
    assert_eq!(page.num_tuples(), 0);
    assert_eq!(page.free_space_offset as usize, PAGE_SIZE);
    assert_eq!(page.available_space(), PAGE_SIZE - PAGE_HEADER_SIZE);
    assert!(!page.is_dirty());
}

#[test]
fn test_insert_and_read_cells() -> Result<(), DatabaseError> {
    let mut page = Page::new(page_id(), PAGE_SIZE);

    let slot0 = page.insert_cell(b"hello")?;
    let slot1 = page.insert_cell(b"world!")?;
    assert_eq!((slot0, slot1), (0, 1));
    assert_eq!(page.get_cell(0), Some(&b"hello"[..]));
    assert_eq!(page.get_cell(1), Some(&b"world!"[..]));
    assert_eq!(page.get_cell(2), None);
    assert_eq!(
        page.available_space(),
        PAGE_SIZE - PAGE_HEADER_SIZE - 2 * SLOT_DIRECTORY_ENTRY_SIZE - 11
    );

    let result = page.insert_cell(&[]);
    assert!(matches!(result, Err(DatabaseError::SerializationError { .. })));
    Ok(())
}

#[test]
fn test_delete_keeps_slot_numbers_stable() -> Result<(), DatabaseError> {
    let mut page = Page::new(page_id(), PAGE_SIZE);
    for cell in [&b"aaa"[..], &b"bbbb"[..], &b"ccccc"[..]] {
        page.insert_cell(cell)?;
    }

    page.delete_cell(1)?;
    assert_eq!(page.get_cell(0), Some(&b"aaa"[..]));
    assert_eq!(page.get_cell(1), None);
    assert_eq!(page.get_cell(2), Some(&b"ccccc"[..]));
    assert_eq!(page.slot_directory.slots.len(), 3);

    // The freed slot is handed out again
    assert_eq!(page.insert_cell(b"dd")?, 1);

    page.delete_cell(2)?;
    assert_eq!(page.slot_directory.slots.len(), 2);

    assert!(matches!(
        page.delete_cell(7),
        Err(DatabaseError::InvalidSlotIndex { index: 7, max: 2 })
    ));
    page.delete_cell(0)?;
    assert!(matches!(
        page.delete_cell(0),
        Err(DatabaseError::TupleNotFound { slot: 0, .. })
    ));
    Ok(())
}

#[test]
fn test_delete_compacts_free_space() -> Result<(), DatabaseError> {
    let mut page = Page::new(page_id(), 128);
    let before = page.available_space();
    page.insert_cell(&[1; 40])?;
    page.insert_cell(&[2; 40])?;
    assert!(!page.can_fit(40));

    page.delete_cell(0)?;
    assert!(page.can_fit(40));
    assert_eq!(page.get_cell(1), Some(&[2u8; 40][..]));

    page.delete_cell(1)?;
    assert_eq!(page.available_space(), before);
    Ok(())
}

#[test]
fn test_full_page_rejects_cell() {
    let mut page = Page::new(page_id(), 64);
    let max = Page::max_cell_size(64);
    assert_eq!(max, 64 - PAGE_HEADER_SIZE - SLOT_DIRECTORY_ENTRY_SIZE);

    assert!(page.insert_cell(&vec![0xAB; max + 1]).is_err());
    page.insert_cell(&vec![0xAB; max]).unwrap();
    assert!(matches!(
        page.insert_cell(b"x"),
        Err(DatabaseError::PageFull { .. })
    ));
}

#[test]
fn test_bytes_round_trip_preserves_cells() -> Result<(), DatabaseError> {
    let mut page = Page::new(page_id(), PAGE_SIZE);
    page.insert_cell(b"first")?;
    page.insert_cell(b"second")?;
    page.insert_cell(b"third")?;
    page.delete_cell(1)?;
    page.mark_dirty(TransactionId::new());

    let restored = Page::from_bytes(page_id(), &page.to_bytes())?;
    assert_eq!(restored.slot_directory, page.slot_directory);
    assert_eq!(restored.free_space_offset, page.free_space_offset);
    assert_eq!(restored.get_cell(0), Some(&b"first"[..]));
    assert_eq!(restored.get_cell(1), None);
    assert_eq!(restored.get_cell(2), Some(&b"third"[..]));
    // Dirtiness is an in-memory property only
    assert!(!restored.is_dirty());
    Ok(())
}

#[test]
fn test_zeroed_bytes_decode_as_empty_page() -> Result<(), DatabaseError> {
    let page = Page::from_bytes(page_id(), &vec![0; PAGE_SIZE])?;
    assert_eq!(page.num_tuples(), 0);
    assert_eq!(page.free_space_offset as usize, PAGE_SIZE);
    Ok(())
}

#[test]
fn test_corrupted_bytes_are_rejected() {
    let mut page = Page::new(page_id(), PAGE_SIZE);
    page.insert_cell(b"payload").unwrap();

    let mut bytes = page.to_bytes();
    bytes[PAGE_SIZE - 1] ^= 0x01;
    assert!(matches!(
        Page::from_bytes(page_id(), &bytes),
        Err(DatabaseError::CorruptedPage { .. })
    ));

    assert!(matches!(
        Page::from_bytes(page_id(), &[0; 8]),
        Err(DatabaseError::InvalidPageSize { actual: 8, .. })
    ));
}

#[test]
fn test_tuples_carry_record_ids() -> Result<(), DatabaseError> {
    let mut page = Page::new(page_id(), PAGE_SIZE);
    let mut alice = tuple(1, "alice");
    let mut bob = tuple(2, "bob");

    assert_eq!(page.insert_tuple(&mut alice)?, RecordId::new(page_id(), 0));
    assert_eq!(page.insert_tuple(&mut bob)?, RecordId::new(page_id(), 1));
    assert_eq!(bob.record_id, Some(RecordId::new(page_id(), 1)));

    assert_eq!(page.tuples()?, vec![alice.clone(), bob.clone()]);
    assert_eq!(page.tuple(1)?, Some(bob.clone()));

    page.delete_tuple(&alice)?;
    assert_eq!(page.tuples()?, vec![bob]);
    assert_eq!(page.tuple(0)?, None);
    Ok(())
}

#[test]
fn test_delete_tuple_checks_record_id() {
    let mut page = Page::new(page_id(), PAGE_SIZE);
    let unplaced = tuple(1, "alice");
    assert!(matches!(
        page.delete_tuple(&unplaced),
        Err(DatabaseError::InvariantViolation { .. })
    ));

    let elsewhere = Tuple::with_record_id(RecordId::new(PageId::new(1, 9), 0), vec![]);
    assert!(matches!(
        page.delete_tuple(&elsewhere),
        Err(DatabaseError::InvariantViolation { .. })
    ));
}

#[test]
fn test_dirty_marker() {
    let mut page = Page::new(page_id(), PAGE_SIZE);
    let tid = TransactionId::new();

    page.mark_dirty(tid);
    assert_eq!(page.dirtied_by(), Some(tid));
    assert!(page.is_dirty());

    page.mark_clean();
    assert_eq!(page.dirtied_by(), None);
}

#[test]
fn test_deleting_last_tuple_twice_reports_missing_tuple() -> Result<(), DatabaseError> {
    let mut page = Page::new(page_id(), PAGE_SIZE);
    let mut alice = tuple(1, "alice");
    page.insert_tuple(&mut alice)?;

    page.delete_tuple(&alice)?;
    assert!(page.slot_directory.slots.is_empty());
    assert!(matches!(
        page.delete_tuple(&alice),
        Err(DatabaseError::TupleNotFound { slot: 0, .. })
    ));
    Ok(())
}
