//! # Paged Session
//!
//! The client-side entry point: a reserved region whose pages materialize
//! from the server on first touch.
//!
//! `Session::connect` negotiates the handshake, reserves the region, and
//! installs the fault trap; after that the region reads and writes like
//! ordinary memory through [`as_slice`](Session::as_slice) and
//! [`as_mut_slice`](Session::as_mut_slice). Writes stay local until
//! [`sync_page`](Session::sync_page) or [`sync_all`](Session::sync_all)
//! pushes them back.
//!
//! The session is neither `Send` nor `Sync` (it holds the raw handler
//! registration), so the strictly synchronous protocol cannot be raced from
//! another thread by construction. One session per process at a time; the
//! SIGSEGV disposition is process-wide state.

use std::net::ToSocketAddrs;
use std::sync::atomic::Ordering;

use tracing::info;

use crate::error::{NetmemError, Result};
use crate::service::PageClient;
use crate::utils::metrics::SessionStats;

use super::fault::{self, FaultGuard, FaultTarget};
use super::mapping::{host_page_size, RegionMapping};

/// A live demand-paged region backed by a remote store.
#[derive(Debug)]
pub struct Session {
    // Field order is teardown order: uninstall the trap, release the
    // mapping, close the stream.
    guard: FaultGuard,
    mapping: RegionMapping,
    client: PageClient,
    scratch: Vec<u8>,
    pages_synced: u64,
    disconnected: bool,
}

impl Session {
    /// Negotiate a session and map the region.
    ///
    /// The page size is the host page size; `memory_size` must be a nonzero
    /// multiple of it. The mapping is only reserved after the server accepts
    /// the handshake.
    pub fn connect<A: ToSocketAddrs>(addr: A, memory_size: u64) -> Result<Self> {
        let page_size = host_page_size()?;
        if memory_size == 0 || memory_size % page_size != 0 {
            return Err(NetmemError::Config(format!(
                "region size {memory_size} is not a nonzero multiple of the host page size {page_size}"
            )));
        }

        let client = PageClient::connect(addr, page_size, memory_size)?;
        let mapping = RegionMapping::reserve(memory_size as usize, page_size as usize)?;
        let target = FaultTarget::new(
            mapping.base() as usize,
            mapping.len(),
            page_size as usize,
            client.raw_fd(),
        );
        let guard = fault::install(Box::new(target))?;
        info!(page_size, memory_size, "Demand-paged region mapped");

        Ok(Self {
            guard,
            mapping,
            client,
            scratch: vec![0u8; page_size as usize],
            pages_synced: 0,
            disconnected: false,
        })
    }

    /// The negotiated page size.
    pub fn page_size(&self) -> u64 {
        self.client.page_size()
    }

    /// The region size in bytes.
    pub fn memory_size(&self) -> u64 {
        self.mapping.len() as u64
    }

    /// The whole region as a byte slice.
    ///
    /// Reading a page that is not yet resident blocks mid-load while the
    /// fetch runs; afterwards the page reads like ordinary memory.
    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.mapping.base(), self.mapping.len()) }
    }

    /// The whole region as a mutable byte slice.
    ///
    /// A store to a non-resident page fetches the page first, then applies
    /// the store; local writes stay local until synced.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.mapping.base(), self.mapping.len()) }
    }

    /// Push one page back to the server. `offset` must be page-aligned and
    /// inside the region.
    pub fn sync_page(&mut self, offset: u64) -> Result<()> {
        validate_page_offset(offset, self.page_size(), self.memory_size())?;
        self.stage(offset);
        self.client.sync_page(offset, &self.scratch)?;
        self.pages_synced += 1;
        Ok(())
    }

    /// Push every page back to the server, in ascending offset order.
    ///
    /// Pages that were never touched are fetched by the staging copy first,
    /// so a full walk over a mostly-untouched region is expensive. Dirty
    /// tracking is coarse by design.
    pub fn sync_all(&mut self) -> Result<()> {
        let page_size = self.page_size();
        let mut offset = 0;
        while offset < self.memory_size() {
            self.sync_page(offset)?;
            offset += page_size;
        }
        Ok(())
    }

    /// Counters for this session's paging activity.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            pages_fetched: self.guard.target().pages_fetched.load(Ordering::Relaxed),
            pages_synced: self.pages_synced,
        }
    }

    /// Announce teardown to the server, then release everything.
    ///
    /// Dropping the session does the same with the wire error swallowed;
    /// this path surfaces it.
    pub fn disconnect(mut self) -> Result<()> {
        self.disconnected = true;
        self.client.send_disconnect()
        // Drop then uninstalls the trap, unmaps the region, closes the
        // stream, in that order.
    }

    // Staging copy into the scratch buffer. Reading through the region
    // pointer faults the page in first if needed, so the sync exchange that
    // follows can never interleave with a fetch on the same stream.
    fn stage(&mut self, offset: u64) {
        let page_size = self.scratch.len();
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.mapping.base().add(offset as usize),
                self.scratch.as_mut_ptr(),
                page_size,
            );
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.disconnected {
            let _ = self.client.send_disconnect();
        }
    }
}

fn validate_page_offset(offset: u64, page_size: u64, memory_size: u64) -> Result<()> {
    if offset % page_size != 0 {
        return Err(NetmemError::Misaligned { offset, page_size });
    }
    match offset.checked_add(page_size) {
        Some(end) if end <= memory_size => Ok(()),
        _ => Err(NetmemError::OutOfBounds {
            offset,
            memory_size,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset_validation() {
        assert!(validate_page_offset(0, 4096, 0x10000).is_ok());
        assert!(validate_page_offset(0x3000, 4096, 0x10000).is_ok());
        assert!(validate_page_offset(0xF000, 4096, 0x10000).is_ok());

        assert!(matches!(
            validate_page_offset(0x300A, 4096, 0x10000),
            Err(NetmemError::Misaligned { .. })
        ));
        assert!(matches!(
            validate_page_offset(0x10000, 4096, 0x10000),
            Err(NetmemError::OutOfBounds { .. })
        ));
        assert!(matches!(
            validate_page_offset(u64::MAX - 4095, 4096, 0x10000),
            Err(NetmemError::OutOfBounds { .. })
        ));
    }
}
