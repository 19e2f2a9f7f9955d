//! # Backing Store
//!
//! The authoritative memory contents for one paging session.
//!
//! A contiguous byte array sized exactly to the negotiated memory size. Page
//! offsets sent by the client index into it directly; every access is
//! bounds-checked with overflow-safe arithmetic. The store is (re)allocated on
//! each accepted handshake and dropped when the connection ends.
//!
//! A fresh store carries a deterministic pattern: page-sized block `i` is
//! filled with the byte `0xA0 + i` (wrapping). That gives never-written pages
//! recognizable content and lets a first-touch read be checked end to end.
//! A server configured with a persist file restores the previous image
//! instead, so synced pages outlive the session that wrote them.

use crate::error::{NetmemError, Result};

/// Fill byte of block 0; block `i` is filled with this value plus `i`, wrapping.
const PATTERN_SEED: u8 = 0xA0;

/// The server-side memory image for one session.
#[derive(Debug)]
pub struct BackingStore {
    data: Vec<u8>,
    page_size: u64,
}

impl BackingStore {
    /// Allocate a store of `memory_size` bytes and lay down the block pattern.
    ///
    /// Callers validate the geometry during the handshake; this constructor
    /// assumes `memory_size` is a nonzero multiple of `page_size`.
    pub fn allocate(page_size: u64, memory_size: u64) -> Self {
        let mut data = vec![0u8; memory_size as usize];
        for (i, block) in data.chunks_mut(page_size as usize).enumerate() {
            block.fill(PATTERN_SEED.wrapping_add(i as u8));
        }
        Self { data, page_size }
    }

    /// Rebuild a store from a persisted image.
    ///
    /// Callers check that `data` matches the negotiated memory size before
    /// handing it in.
    pub fn from_contents(page_size: u64, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len() as u64 % page_size, 0);
        Self { data, page_size }
    }

    /// The page size this store was allocated for.
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Total size of the store in bytes.
    pub fn memory_size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Read one page. Fails if the page would run past the end of the store.
    pub fn read_page(&self, offset: u64) -> Result<&[u8]> {
        let range = self.page_range(offset)?;
        Ok(&self.data[range])
    }

    /// Overwrite one page. Fails if the page would run past the end of the
    /// store. `data` must be exactly one page.
    pub fn write_page(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        debug_assert_eq!(data.len() as u64, self.page_size);
        let range = self.page_range(offset)?;
        self.data[range].copy_from_slice(data);
        Ok(())
    }

    /// The whole store, for persistence writes and verification.
    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    fn page_range(&self, offset: u64) -> Result<std::ops::Range<usize>> {
        let end = offset
            .checked_add(self.page_size)
            .filter(|&end| end <= self.memory_size())
            .ok_or(NetmemError::OutOfBounds {
                offset,
                memory_size: self.memory_size(),
            })?;
        Ok(offset as usize..end as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_pattern_fill_per_block() {
        let store = BackingStore::allocate(16, 16 * 4);
        assert_eq!(store.read_page(0).unwrap(), &[0xA0; 16]);
        assert_eq!(store.read_page(16).unwrap(), &[0xA1; 16]);
        assert_eq!(store.read_page(48).unwrap(), &[0xA3; 16]);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_pattern_wraps_past_byte_range() {
        // Block 0x60 holds 0xA0 + 0x60 = 0x100, which wraps to 0x00.
        let store = BackingStore::allocate(16, 16 * 0x61);
        assert_eq!(store.read_page(16 * 0x60).unwrap(), &[0x00; 16]);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_write_then_read_back() {
        let mut store = BackingStore::allocate(16, 64);
        let page = [0x5A; 16];
        store.write_page(32, &page).unwrap();
        assert_eq!(store.read_page(32).unwrap(), &page);
        // Neighbours untouched
        assert_eq!(store.read_page(16).unwrap(), &[0xA1; 16]);
        assert_eq!(store.read_page(48).unwrap(), &[0xA3; 16]);
    }

    #[test]
    fn test_reads_past_end_rejected() {
        let store = BackingStore::allocate(16, 64);
        assert!(matches!(
            store.read_page(64),
            Err(NetmemError::OutOfBounds { offset: 64, .. })
        ));
        // One byte short of a full page
        assert!(matches!(
            store.read_page(49),
            Err(NetmemError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_offset_overflow_rejected() {
        let mut store = BackingStore::allocate(16, 64);
        assert!(matches!(
            store.read_page(u64::MAX - 8),
            Err(NetmemError::OutOfBounds { .. })
        ));
        assert!(matches!(
            store.write_page(u64::MAX - 8, &[0u8; 16]),
            Err(NetmemError::OutOfBounds { .. })
        ));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_restored_image_replaces_pattern() {
        let mut image = vec![0u8; 64];
        image[32..48].fill(0x77);
        let store = BackingStore::from_contents(16, image);
        assert_eq!(store.read_page(32).unwrap(), &[0x77; 16]);
        assert_eq!(store.read_page(0).unwrap(), &[0x00; 16]);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_unaligned_offset_reads_raw_bytes() {
        // Offsets are used as raw indices; alignment is the client's business.
        let store = BackingStore::allocate(16, 64);
        let page = store.read_page(8).unwrap();
        assert_eq!(&page[..8], &[0xA0; 8]);
        assert_eq!(&page[8..], &[0xA1; 8]);
    }
}
