//! # Blocking Wire Primitives
//!
//! Full-transfer send/receive on a raw socket descriptor.
//!
//! Every helper here either moves the complete byte count or fails: a
//! zero-length transfer means the peer closed the stream
//! ([`NetmemError::PeerClosed`]), `EINTR` is retried, and any other errno is a
//! fatal transport error. There is no retry layer above this; callers tear the
//! session down on any error.
//!
//! These functions are async-signal-safe: no allocation, no locks, raw
//! `read(2)`/`write(2)` only. The fault handler calls them directly, which is
//! why they take a [`RawFd`] instead of a stream type. OS-level error returns
//! are wrapped with `io::Error::from_raw_os_error`, which does not allocate.

use std::io;
use std::os::fd::{BorrowedFd, RawFd};

use nix::errno::Errno;
use nix::unistd;

use crate::error::{NetmemError, Result};

/// Send the whole buffer, looping until every byte is written.
pub fn send_all(fd: RawFd, buf: &[u8]) -> Result<()> {
    let mut sent = 0;
    while sent < buf.len() {
        // The fd is owned by the session's stream and outlives this call.
        let fd = unsafe { BorrowedFd::borrow_raw(fd) };
        match unistd::write(fd, &buf[sent..]) {
            Ok(0) => return Err(NetmemError::PeerClosed),
            Ok(n) => sent += n,
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(io::Error::from_raw_os_error(errno as i32).into()),
        }
    }
    Ok(())
}

/// Receive exactly `buf.len()` bytes, looping until the buffer is full.
pub fn recv_exact(fd: RawFd, buf: &mut [u8]) -> Result<()> {
    let mut received = 0;
    while received < buf.len() {
        match unistd::read(fd, &mut buf[received..]) {
            Ok(0) => return Err(NetmemError::PeerClosed),
            Ok(n) => received += n,
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(io::Error::from_raw_os_error(errno as i32).into()),
        }
    }
    Ok(())
}

/// Send a single opcode or status byte.
pub fn send_byte(fd: RawFd, byte: u8) -> Result<()> {
    send_all(fd, &[byte])
}

/// Receive a single opcode or status byte.
pub fn recv_byte(fd: RawFd) -> Result<u8> {
    let mut buf = [0u8; 1];
    recv_exact(fd, &mut buf)?;
    Ok(buf[0])
}

/// Send a 64-bit value as 8 little-endian bytes.
pub fn send_u64(fd: RawFd, value: u64) -> Result<()> {
    send_all(fd, &value.to_le_bytes())
}

/// Receive a 64-bit value from 8 little-endian bytes.
pub fn recv_u64(fd: RawFd) -> Result<u64> {
    let mut buf = [0u8; 8];
    recv_exact(fd, &mut buf)?;
    Ok(u64::from_le_bytes(buf))
}
