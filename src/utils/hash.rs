use crc32fast::Hasher;

use crate::types::CHECKSUM_SIZE;

/// CRC32 over every byte of an encoded page except the leading checksum field.
pub fn calculate_page_checksum(page_bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&page_bytes[CHECKSUM_SIZE..]);
    hasher.finalize()
}

pub fn verify_page_checksum(page_bytes: &[u8]) -> bool {
    if page_bytes.len() < CHECKSUM_SIZE {
        return false;
    }
    let mut stored = [0u8; CHECKSUM_SIZE];
    stored.copy_from_slice(&page_bytes[..CHECKSUM_SIZE]);
    calculate_page_checksum(page_bytes) == u32::from_le_bytes(stored)
}
