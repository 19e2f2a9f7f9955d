//! # Fault Trap
//!
//! Process-wide SIGSEGV interception that turns first-touch faults into
//! synchronous page fetches.
//!
//! The handler classifies the faulting address: inside the managed region it
//! grants the page read/write access, runs a full fetch exchange on the
//! session's socket, lands the payload directly in the page, and returns so
//! the OS retries the faulting instruction. Outside the region it re-arms the
//! default disposition and returns, letting the retried instruction crash
//! with stock segfault semantics.
//!
//! Everything on the handler path is async-signal-safe: no allocation, no
//! locks, no formatted logging; raw `read`/`write`/`mprotect`/`sigaction`
//! only, with errno saved and restored around the body. Unrecoverable errors
//! (a failed permission grant, a dead connection mid-fetch) write a static
//! diagnostic to stderr and abort, because returning would resume execution
//! over uninitialized memory.
//!
//! The handler reaches session state through one process-wide `AtomicPtr`
//! slot, set on install and cleared on teardown. The SIGSEGV disposition is
//! process state, so at most one session can be installed at a time.

use std::ffi::c_void;
use std::os::fd::{BorrowedFd, RawFd};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use libc::{c_int, siginfo_t};
use nix::sys::mman::{mprotect, ProtFlags};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd;

use crate::error::{NetmemError, Result};
use crate::protocol::frame::encode_fetch;
use crate::transport::blocking;

/// Session state the handler needs, owned by the session and reached through
/// the process-wide slot.
pub(crate) struct FaultTarget {
    base: usize,
    len: usize,
    page_size: usize,
    fd: RawFd,
    /// Demand fetches completed; bumped once per first-touch fault.
    pub(crate) pages_fetched: AtomicU64,
}

impl FaultTarget {
    pub(crate) fn new(base: usize, len: usize, page_size: usize, fd: RawFd) -> Self {
        Self {
            base,
            len,
            page_size,
            fd,
            pages_fetched: AtomicU64::new(0),
        }
    }
}

/// The one process-wide handler slot.
static ACTIVE_TARGET: AtomicPtr<FaultTarget> = AtomicPtr::new(ptr::null_mut());

/// Disposition to restore on teardown. Touched only from install/uninstall,
/// never from the handler.
static PREV_ACTION: Mutex<Option<SigAction>> = Mutex::new(None);

/// Claim the handler slot and install the SIGSEGV handler.
///
/// Fails with [`NetmemError::SessionActive`] if another session holds the
/// slot.
pub(crate) fn install(target: Box<FaultTarget>) -> Result<FaultGuard> {
    let raw = Box::into_raw(target);
    if ACTIVE_TARGET
        .compare_exchange(ptr::null_mut(), raw, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        drop(unsafe { Box::from_raw(raw) });
        return Err(NetmemError::SessionActive);
    }

    let action = SigAction::new(
        SigHandler::SigAction(segv_handler),
        SaFlags::SA_SIGINFO | SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    let prev = match unsafe { sigaction(Signal::SIGSEGV, &action) } {
        Ok(prev) => prev,
        Err(errno) => {
            ACTIVE_TARGET.store(ptr::null_mut(), Ordering::Release);
            drop(unsafe { Box::from_raw(raw) });
            return Err(NetmemError::os("sigaction", errno));
        }
    };
    *PREV_ACTION
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(prev);

    Ok(FaultGuard { target: raw })
}

/// Owns the handler registration; uninstalls and frees the target on drop.
#[derive(Debug)]
pub(crate) struct FaultGuard {
    target: *mut FaultTarget,
}

impl FaultGuard {
    pub(crate) fn target(&self) -> &FaultTarget {
        // Valid until drop clears the slot and frees the allocation.
        unsafe { &*self.target }
    }
}

impl Drop for FaultGuard {
    fn drop(&mut self) {
        // Clear the slot before freeing so a late fault sees null and re-arms
        // the default disposition instead of reading a dangling target.
        ACTIVE_TARGET.store(ptr::null_mut(), Ordering::Release);
        if let Some(prev) = PREV_ACTION
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            let _ = unsafe { sigaction(Signal::SIGSEGV, &prev) };
        }
        drop(unsafe { Box::from_raw(self.target) });
    }
}

extern "C" fn segv_handler(_sig: c_int, info: *mut siginfo_t, _ctx: *mut c_void) {
    let saved_errno = unsafe { *libc::__errno_location() };

    let target = ACTIVE_TARGET.load(Ordering::Acquire);
    if target.is_null() {
        rearm_default();
        unsafe { *libc::__errno_location() = saved_errno };
        return;
    }
    // The slot is cleared before the target is freed, so a non-null load
    // stays valid for this invocation.
    let t = unsafe { &*target };

    let addr = unsafe { (*info).si_addr() } as usize;
    if addr < t.base || addr - t.base >= t.len {
        // Not ours: the retried instruction gets stock segfault semantics.
        rearm_default();
        unsafe { *libc::__errno_location() = saved_errno };
        return;
    }

    let page_base = addr & !(t.page_size - 1);
    let offset = (page_base - t.base) as u64;

    let Some(page) = NonNull::new(page_base as *mut c_void) else {
        die(b"page address lookup", 0);
    };
    if let Err(errno) =
        unsafe { mprotect(page, t.page_size, ProtFlags::PROT_READ | ProtFlags::PROT_WRITE) }
    {
        die(b"mprotect", errno as i32);
    }

    let frame = encode_fetch(offset);
    if let Err(e) = blocking::send_all(t.fd, &frame) {
        die(b"page request send", wire_errno(&e));
    }
    // The payload lands straight in the granted page.
    let page_bytes = unsafe { std::slice::from_raw_parts_mut(page_base as *mut u8, t.page_size) };
    if let Err(e) = blocking::recv_exact(t.fd, page_bytes) {
        die(b"page payload receive", wire_errno(&e));
    }

    t.pages_fetched.fetch_add(1, Ordering::Relaxed);
    unsafe { *libc::__errno_location() = saved_errno };
}

/// Put the default SIGSEGV disposition back so the retried instruction
/// produces a normal crash.
fn rearm_default() {
    let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    let _ = unsafe { sigaction(Signal::SIGSEGV, &default) };
}

fn wire_errno(err: &NetmemError) -> i32 {
    match err {
        NetmemError::Io(e) => e.raw_os_error().unwrap_or(0),
        _ => 0,
    }
}

/// Write a diagnostic naming the failing operation and abort. `code` of zero
/// reports a peer disconnect instead of an errno.
fn die(op: &[u8], code: i32) -> ! {
    write_raw(b"netmem: fault handler: ");
    write_raw(op);
    if code != 0 {
        write_raw(b" failed, errno ");
        let mut buf = [0u8; 12];
        write_raw(format_decimal(code, &mut buf));
    } else {
        write_raw(b" failed, connection closed by peer");
    }
    write_raw(b"\n");
    std::process::abort();
}

fn write_raw(bytes: &[u8]) {
    let stderr = unsafe { BorrowedFd::borrow_raw(libc::STDERR_FILENO) };
    let _ = unistd::write(stderr, bytes);
}

/// Render a decimal without allocating.
fn format_decimal(value: i32, buf: &mut [u8; 12]) -> &[u8] {
    if value == 0 {
        buf[0] = b'0';
        return &buf[..1];
    }
    let mut v = value.unsigned_abs();
    let mut pos = buf.len();
    while v > 0 {
        pos -= 1;
        buf[pos] = b'0' + (v % 10) as u8;
        v /= 10;
    }
    if value < 0 {
        pos -= 1;
        buf[pos] = b'-';
    }
    &buf[pos..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_decimal() {
        let mut buf = [0u8; 12];
        assert_eq!(format_decimal(0, &mut buf), b"0");
        let mut buf = [0u8; 12];
        assert_eq!(format_decimal(13, &mut buf), b"13");
        let mut buf = [0u8; 12];
        assert_eq!(format_decimal(104, &mut buf), b"104");
        let mut buf = [0u8; 12];
        assert_eq!(format_decimal(-7, &mut buf), b"-7");
        let mut buf = [0u8; 12];
        assert_eq!(format_decimal(i32::MIN, &mut buf), b"-2147483648");
    }

    #[test]
    fn test_fault_target_counter_starts_at_zero() {
        let target = FaultTarget::new(0x1000, 0x4000, 0x1000, -1);
        assert_eq!(target.pages_fetched.load(Ordering::Relaxed), 0);
    }
}
