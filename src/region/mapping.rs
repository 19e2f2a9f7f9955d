//! # Region Mapping
//!
//! RAII ownership of the client's reserved address range.
//!
//! The region is an anonymous, shareable mapping created with no access
//! permissions at all: every page starts out unmapped in the paging sense,
//! and the first touch of any page raises the fault the trap layer resolves.
//! Permissions are granted page by page from the fault handler; this type
//! only reserves and releases the range.

use std::ffi::c_void;
use std::num::NonZeroUsize;
use std::ptr::NonNull;

use nix::sys::mman::{mmap_anonymous, munmap, MapFlags, ProtFlags};
use nix::unistd::{sysconf, SysconfVar};
use tracing::error;

use crate::error::{NetmemError, Result};

/// The host page size, which is the granularity every fault resolves at.
pub fn host_page_size() -> Result<u64> {
    match sysconf(SysconfVar::PAGE_SIZE) {
        Ok(Some(size)) if size > 0 => Ok(size as u64),
        Ok(_) => Err(NetmemError::Config(
            "host page size unavailable".to_string(),
        )),
        Err(errno) => Err(NetmemError::os("sysconf", errno)),
    }
}

/// An anonymous `PROT_NONE` reservation, unmapped on drop.
#[derive(Debug)]
pub struct RegionMapping {
    base: NonNull<c_void>,
    len: usize,
    page_size: usize,
}

impl RegionMapping {
    /// Reserve `len` bytes with no access permissions.
    ///
    /// `len` must be a nonzero multiple of `page_size`; the session validates
    /// that before reserving.
    pub fn reserve(len: usize, page_size: usize) -> Result<Self> {
        let length = NonZeroUsize::new(len)
            .ok_or_else(|| NetmemError::Config("region size must be nonzero".to_string()))?;

        // MAP_FIXED is never passed, so no existing mapping can be clobbered.
        let base = unsafe {
            mmap_anonymous(
                None,
                length,
                ProtFlags::PROT_NONE,
                MapFlags::MAP_SHARED,
            )
        }
        .map_err(|errno| NetmemError::os("mmap", errno))?;

        Ok(Self {
            base,
            len,
            page_size,
        })
    }

    /// Base address of the reservation.
    pub fn base(&self) -> *mut u8 {
        self.base.as_ptr().cast()
    }

    /// Size of the reservation in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the reservation is empty (it never is; `reserve` rejects zero).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Page size the region was reserved for.
    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

impl Drop for RegionMapping {
    fn drop(&mut self) {
        // Length is exactly what mmap returned the base for.
        if let Err(errno) = unsafe { munmap(self.base, self.len) } {
            error!(error = %errno, "munmap failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_reserve_is_page_aligned() {
        let page_size = host_page_size().unwrap() as usize;
        let mapping = RegionMapping::reserve(page_size * 4, page_size).unwrap();
        assert_eq!(mapping.base() as usize % page_size, 0);
        assert_eq!(mapping.len(), page_size * 4);
        assert!(!mapping.is_empty());
    }

    #[test]
    fn test_zero_length_rejected() {
        let err = RegionMapping::reserve(0, 4096);
        assert!(matches!(err, Err(NetmemError::Config(_))));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_host_page_size_sane() {
        let page_size = host_page_size().unwrap();
        assert!(page_size.is_power_of_two());
        assert!(page_size >= 512);
    }
}
