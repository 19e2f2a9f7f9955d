//! # Error Types
//!
//! Error handling for the paging protocol and the fault-driven client.
//!
//! This module defines all error variants the crate surfaces, from low-level
//! transport failures to handshake rejection and OS-call failures in the
//! memory layer.
//!
//! ## Error Categories
//! - **Transport errors**: OS-level I/O failures and peer disconnects
//! - **Protocol violations**: unknown opcodes, unexpected status bytes
//! - **Negotiation errors**: connect handshake rejected by the server
//! - **Validation errors**: page offsets outside the backing store
//! - **OS errors**: `mmap`/`mprotect`/`sigaction` failures with the failing
//!   operation named
//!
//! Every error in the session path is terminal: the protocol has no retry
//! layer, so callers tear the session down and report the chain.
//!
//! ## Example Usage
//! ```rust
//! use netmem::error::{NetmemError, Result};
//!
//! fn check_offset(offset: u64, memory_size: u64, page_size: u64) -> Result<()> {
//!     match offset.checked_add(page_size) {
//!         Some(end) if end <= memory_size => Ok(()),
//!         _ => Err(NetmemError::OutOfBounds { offset, memory_size }),
//!     }
//! }
//!
//! assert!(check_offset(0x3000, 0x10000, 4096).is_ok());
//! assert!(matches!(
//!     check_offset(0xF000, 0x10000, 4096 * 2),
//!     Err(NetmemError::OutOfBounds { .. })
//! ));
//! ```

use std::io;
use thiserror::Error;

// NetmemError is the primary error type for all session and server operations
#[derive(Error, Debug)]
pub enum NetmemError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("connection closed by peer")]
    PeerClosed,

    #[error("protocol violation: unexpected opcode {opcode:#04x}")]
    UnexpectedOpcode { opcode: u8 },

    #[error("protocol violation: unexpected status byte {status:#04x}")]
    UnexpectedStatus { status: u8 },

    #[error("server rejected session parameters (page_size={page_size}, memory_size={memory_size})")]
    NegotiationRejected { page_size: u64, memory_size: u64 },

    #[error("offset {offset:#x} out of bounds for a {memory_size}-byte store")]
    OutOfBounds { offset: u64, memory_size: u64 },

    #[error("offset {offset:#x} is not aligned to the {page_size}-byte page size")]
    Misaligned { offset: u64, page_size: u64 },

    #[error("server rejected sync of page at offset {offset:#x}")]
    SyncRejected { offset: u64 },

    #[error("{op} failed: {source}")]
    Os {
        op: &'static str,
        #[source]
        source: nix::Error,
    },

    #[error("a paged session is already active in this process")]
    SessionActive,

    #[error("configuration error: {0}")]
    Config(String),
}

impl NetmemError {
    /// Wraps an OS error with the name of the failing call.
    pub fn os(op: &'static str, source: nix::Error) -> Self {
        Self::Os { op, source }
    }
}

/// Type alias for Results using NetmemError
pub type Result<T> = std::result::Result<T, NetmemError>;
