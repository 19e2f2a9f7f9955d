//! # Wire Protocol
//!
//! Opcode table, request/response frames, and the server-side codec for the
//! paging protocol.
//!
//! This module defines the byte-level contract between the fault-driven client
//! and the page server. The protocol is strictly synchronous: one request is
//! answered before the next is read, over a single persistent TCP stream.
//!
//! ## Components
//! - **Opcode**: the four request opcodes and the response status bytes
//! - **Frame**: typed `Request`/`Response` values plus allocation-free encode
//!   helpers for the client side
//! - **Codec**: a stateful tokio codec decoding client requests and encoding
//!   responses on the server side
//!
//! ## Wire Format
//! ```text
//! CONNECT       [0xA0] [page_size: u64 LE] [memory_size: u64 LE]  -> [ACK 0xE0 | NACK 0xF0]
//! REQUEST_PAGE  [0x80] [offset: u64 LE]                           -> [page_size raw bytes]
//! SYNC_PAGE     [0x90] [offset: u64 LE] [page_size raw bytes]     -> [OK 0x91 | ERR 0x92]
//! DISCONNECT    [0xB0]                                            -> (none)
//! ```
//!
//! All 64-bit values travel little-endian. The page payload of a
//! `REQUEST_PAGE` response has no status byte ahead of it; the handshake and
//! sync exchanges use their own distinct status pairs.

pub mod codec;
pub mod frame;
pub mod opcode;

pub use codec::RequestCodec;
pub use frame::{Request, Response};
pub use opcode::Opcode;
