//! # Opcodes and Status Bytes
//!
//! The request opcodes and response status values of the paging protocol.
//!
//! Opcodes identify client requests; status bytes are single-byte server
//! replies. The handshake pair (`ACK`/`NACK`) and the sync pair
//! (`SYNC_OK`/`SYNC_ERR`) are deliberately distinct values so a desynchronized
//! stream is caught instead of misread.

/// Handshake accepted.
pub const STATUS_ACK: u8 = 0xE0;
/// Handshake rejected; the server closes the connection.
pub const STATUS_NACK: u8 = 0xF0;
/// Page sync applied to the backing store.
pub const STATUS_SYNC_OK: u8 = 0x91;
/// Page sync rejected; the connection stays up.
pub const STATUS_SYNC_ERR: u8 = 0x92;

/// Request opcodes sent by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Negotiate page size and region size; must be the first request.
    Connect = 0xA0,
    /// Fetch one page; answered with raw page bytes.
    RequestPage = 0x80,
    /// Push one page back to the store; answered with a sync status byte.
    SyncPage = 0x90,
    /// Announce teardown; no response.
    Disconnect = 0xB0,
}

impl Opcode {
    /// Get the wire byte for this opcode.
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Decode an opcode from its wire byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0xA0 => Some(Opcode::Connect),
            0x80 => Some(Opcode::RequestPage),
            0x90 => Some(Opcode::SyncPage),
            0xB0 => Some(Opcode::Disconnect),
            _ => None,
        }
    }

    /// Get human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Connect => "CONNECT",
            Opcode::RequestPage => "REQUEST_PAGE",
            Opcode::SyncPage => "SYNC_PAGE",
            Opcode::Disconnect => "DISCONNECT",
        }
    }
}
