use crate::{
    types::{
        CHECKSUM_SIZE, PAGE_HEADER_SIZE, PageId, RecordId, SLOT_DIRECTORY_ENTRY_SIZE, SlotId,
        TransactionId, error::DatabaseError, tuple::Tuple,
    },
    utils::hash::{calculate_page_checksum, verify_page_checksum},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotEntry {
    pub offset: u16, // Offset from beginning of page
    pub length: u16, // Length of the cell, 0 marks a free slot
}

impl SlotEntry {
    const FREE: SlotEntry = SlotEntry {
        offset: 0,
        length: 0,
    };

    pub fn is_free(&self) -> bool {
        self.length == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotDirectory {
    pub slots: Vec<SlotEntry>,
}

/*
 * Heap Page Layout (Slotted Page Structure)
 * ┌─────────────────────────────────────────────────────────────────┐
 * │                    PAGE HEADER (16 bytes)                       │
 * │  checksum(4) | slot_count(2) | free_space_offset(2) |          │
 * │  reserved(8)                                                    │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                  SLOT DIRECTORY                                 │
 * │  [slot0: offset(2)|len(2)] [slot1: offset(2)|len(2)] ...       │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                    FREE SPACE                                   │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                   CELL DATA                                     │
 * │  [...cell N...] [...cell 2...] [...cell 1...] [...cell 0...]   │
 * └─────────────────────────────────────────────────────────────────┘
 *
 * The checksum covers every byte after itself. A page of all zeroes is an
 * empty page that was never written.
 */

/// In-memory copy of one on-disk heap page plus its dirty marker.
#[derive(Debug, Clone)]
pub struct Page {
    pub page_id: PageId,
    pub slot_directory: SlotDirectory,
    pub free_space_offset: u16,
    data: Vec<u8>,
    dirtied_by: Option<TransactionId>,
}

impl Page {
    pub fn new(page_id: PageId, page_size: usize) -> Self {
        Self {
            page_id,
            slot_directory: SlotDirectory { slots: Vec::new() },
            free_space_offset: page_size as u16,
            data: vec![0; page_size],
            dirtied_by: None,
        }
    }

    /// Largest cell a fresh page of `page_size` bytes can hold.
    pub fn max_cell_size(page_size: usize) -> usize {
        page_size - PAGE_HEADER_SIZE - SLOT_DIRECTORY_ENTRY_SIZE
    }

    pub fn page_size(&self) -> usize {
        self.data.len()
    }

    /// Serialize the page to bytes following the documented layout
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = vec![0u8; self.page_size()];
        let mut offset = CHECKSUM_SIZE;

        let slot_count = self.slot_directory.slots.len() as u16;
        buffer[offset..offset + 2].copy_from_slice(&slot_count.to_le_bytes());
        offset += 2;
        buffer[offset..offset + 2].copy_from_slice(&self.free_space_offset.to_le_bytes());

        offset = PAGE_HEADER_SIZE;
        for slot in &self.slot_directory.slots {
            buffer[offset..offset + 2].copy_from_slice(&slot.offset.to_le_bytes());
            offset += 2;
            buffer[offset..offset + 2].copy_from_slice(&slot.length.to_le_bytes());
            offset += 2;
        }

        let cells_start = self.free_space_offset as usize;
        buffer[cells_start..].copy_from_slice(&self.data[cells_start..]);

        let checksum = calculate_page_checksum(&buffer);
        buffer[..CHECKSUM_SIZE].copy_from_slice(&checksum.to_le_bytes());
        buffer
    }

    /// Deserialize a page from bytes following the documented layout
    pub fn from_bytes(page_id: PageId, bytes: &[u8]) -> Result<Self, DatabaseError> {
        let page_size = bytes.len();
        if page_size < PAGE_HEADER_SIZE + SLOT_DIRECTORY_ENTRY_SIZE || page_size > u16::MAX as usize {
            return Err(DatabaseError::InvalidPageSize {
                expected: crate::types::PAGE_SIZE,
                actual: page_size,
            });
        }
        if bytes.iter().all(|&b| b == 0) {
            return Ok(Page::new(page_id, page_size));
        }
        if !verify_page_checksum(bytes) {
            return Err(DatabaseError::CorruptedPage {
                page_id,
                reason: "Checksum mismatch".to_string(),
            });
        }

        let mut offset = CHECKSUM_SIZE;
        let slot_count = u16::from_le_bytes([bytes[offset], bytes[offset + 1]]) as usize;
        offset += 2;
        let free_space_offset = u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);

        let directory_end = PAGE_HEADER_SIZE + slot_count * SLOT_DIRECTORY_ENTRY_SIZE;
        if directory_end > page_size {
            return Err(DatabaseError::CorruptedPage {
                page_id,
                reason: "Slot directory extends beyond page boundary".to_string(),
            });
        }
        if (free_space_offset as usize) < directory_end || free_space_offset as usize > page_size {
            return Err(DatabaseError::CorruptedPage {
                page_id,
                reason: format!("Invalid free_space_offset: {}", free_space_offset),
            });
        }

        offset = PAGE_HEADER_SIZE;
        let mut slots = Vec::with_capacity(slot_count);
        for _ in 0..slot_count {
            let slot_offset = u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
            let length = u16::from_le_bytes([bytes[offset + 2], bytes[offset + 3]]);
            offset += SLOT_DIRECTORY_ENTRY_SIZE;

            let slot = SlotEntry {
                offset: slot_offset,
                length,
            };
            if !slot.is_free()
                && ((slot_offset as usize) < free_space_offset as usize
                    || slot_offset as usize + length as usize > page_size)
            {
                return Err(DatabaseError::CorruptedPage {
                    page_id,
                    reason: format!(
                        "Slot at offset {} with length {} lies outside the cell area",
                        slot_offset, length
                    ),
                });
            }
            slots.push(slot);
        }

        Ok(Page {
            page_id,
            slot_directory: SlotDirectory { slots },
            free_space_offset,
            data: bytes.to_vec(),
            dirtied_by: None,
        })
    }

    pub fn available_space(&self) -> usize {
        let slot_directory_size = self.slot_directory.slots.len() * SLOT_DIRECTORY_ENTRY_SIZE;
        self.free_space_offset as usize - PAGE_HEADER_SIZE - slot_directory_size
    }

    pub fn can_fit(&self, data_size: usize) -> bool {
        let needs_slot = if self.first_free_slot().is_some() {
            0
        } else {
            SLOT_DIRECTORY_ENTRY_SIZE
        };
        self.available_space() >= data_size + needs_slot
    }

    fn first_free_slot(&self) -> Option<usize> {
        self.slot_directory.slots.iter().position(SlotEntry::is_free)
    }

    pub fn insert_cell(&mut self, data: &[u8]) -> Result<SlotId, DatabaseError> {
        if data.is_empty() {
            return Err(DatabaseError::SerializationError {
                details: "Cannot store an empty cell".to_string(),
            });
        }
        if !self.can_fit(data.len()) {
            return Err(DatabaseError::PageFull {
                page_id: self.page_id,
            });
        }

        // Cells grow downward from the end of the page
        let new_offset = self.free_space_offset - data.len() as u16;
        let start = new_offset as usize;
        self.data[start..start + data.len()].copy_from_slice(data);

        let entry = SlotEntry {
            offset: new_offset,
            length: data.len() as u16,
        };
        let slot_index = match self.first_free_slot() {
            Some(index) => {
                self.slot_directory.slots[index] = entry;
                index
            }
            None => {
                self.slot_directory.slots.push(entry);
                self.slot_directory.slots.len() - 1
            }
        };
        self.free_space_offset = new_offset;

        Ok(slot_index as SlotId)
    }

    pub fn get_cell(&self, slot_index: usize) -> Option<&[u8]> {
        match self.slot_directory.slots.get(slot_index) {
            Some(slot) if !slot.is_free() => {
                let start = slot.offset as usize;
                Some(&self.data[start..start + slot.length as usize])
            }
            _ => None,
        }
    }

    /// Frees a slot. Slot numbers of the remaining cells do not change.
    pub fn delete_cell(&mut self, slot_index: usize) -> Result<(), DatabaseError> {
        let max = self.slot_directory.slots.len();
        let slot = self
            .slot_directory
            .slots
            .get_mut(slot_index)
            .ok_or(DatabaseError::InvalidSlotIndex {
                index: slot_index,
                max,
            })?;
        if slot.is_free() {
            return Err(DatabaseError::TupleNotFound {
                page_id: self.page_id,
                slot: slot_index as SlotId,
            });
        }
        *slot = SlotEntry::FREE;

        // Trailing free slots can go; interior ones must stay to keep numbering
        while self.slot_directory.slots.last().is_some_and(SlotEntry::is_free) {
            self.slot_directory.slots.pop();
        }

        self.compact_page();
        Ok(())
    }

    // Defragment the page by moving all cells to eliminate gaps
    fn compact_page(&mut self) {
        let page_size = self.page_size();
        let mut live: Vec<(usize, SlotEntry)> = self
            .slot_directory
            .slots
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, slot)| !slot.is_free())
            .collect();
        // Highest offset first keeps the on-page order of cells
        live.sort_by(|a, b| b.1.offset.cmp(&a.1.offset));

        let mut compacted = vec![0u8; page_size];
        let mut current_offset = page_size;
        for (index, slot) in live {
            let start = slot.offset as usize;
            let length = slot.length as usize;
            current_offset -= length;
            compacted[current_offset..current_offset + length]
                .copy_from_slice(&self.data[start..start + length]);
            self.slot_directory.slots[index].offset = current_offset as u16;
        }

        self.data = compacted;
        self.free_space_offset = current_offset as u16;
    }

    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> Result<RecordId, DatabaseError> {
        let bytes = tuple.to_bytes()?;
        let slot = self.insert_cell(&bytes)?;
        let record_id = RecordId::new(self.page_id, slot);
        tuple.record_id = Some(record_id);
        Ok(record_id)
    }

    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<(), DatabaseError> {
        let record_id = tuple
            .record_id
            .ok_or_else(|| DatabaseError::invariant("tuple has no record id"))?;
        if record_id.page_id != self.page_id {
            return Err(DatabaseError::invariant(format!(
                "tuple {:?} does not live on page {}",
                record_id, self.page_id
            )));
        }
        // A trailing slot freed earlier is trimmed from the directory, but the
        // record id proves it existed
        if record_id.slot as usize >= self.slot_directory.slots.len() {
            return Err(DatabaseError::TupleNotFound {
                page_id: self.page_id,
                slot: record_id.slot,
            });
        }
        self.delete_cell(record_id.slot as usize)
    }

    pub fn tuple(&self, slot: SlotId) -> Result<Option<Tuple>, DatabaseError> {
        match self.get_cell(slot as usize) {
            Some(cell) => {
                let mut tuple = Tuple::from_bytes(cell)?;
                tuple.record_id = Some(RecordId::new(self.page_id, slot));
                Ok(Some(tuple))
            }
            None => Ok(None),
        }
    }

    /// Live tuples in slot order, each carrying its record id.
    pub fn tuples(&self) -> Result<Vec<Tuple>, DatabaseError> {
        let mut tuples = Vec::with_capacity(self.num_tuples());
        for slot in 0..self.slot_directory.slots.len() {
            if let Some(tuple) = self.tuple(slot as SlotId)? {
                tuples.push(tuple);
            }
        }
        Ok(tuples)
    }

    pub fn num_tuples(&self) -> usize {
        self.slot_directory
            .slots
            .iter()
            .filter(|slot| !slot.is_free())
            .count()
    }

    pub fn mark_dirty(&mut self, tid: TransactionId) {
        self.dirtied_by = Some(tid);
    }

    pub fn mark_clean(&mut self) {
        self.dirtied_by = None;
    }

    /// The transaction that modified this page since it was last written, if any.
    pub fn dirtied_by(&self) -> Option<TransactionId> {
        self.dirtied_by
    }

    pub fn is_dirty(&self) -> bool {
        self.dirtied_by.is_some()
    }
}
