//! # Request and Response Frames
//!
//! Typed frames for the paging protocol plus fixed-layout encode helpers.
//!
//! The encode helpers return stack arrays and never allocate, so the client's
//! fault path can build a page request inside a signal handler. The server
//! never uses them; it decodes with [`crate::protocol::RequestCodec`].

use bytes::Bytes;

use super::opcode::Opcode;

/// Wire length of a CONNECT frame: opcode + page_size + memory_size.
pub const CONNECT_FRAME_LEN: usize = 17;
/// Wire length of a REQUEST_PAGE frame: opcode + offset.
pub const FETCH_FRAME_LEN: usize = 9;
/// Wire length of a SYNC_PAGE header: opcode + offset. The page payload follows.
pub const SYNC_HEADER_LEN: usize = 9;
/// Complete DISCONNECT frame.
pub const DISCONNECT_FRAME: [u8; 1] = [0xB0];

/// A decoded client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Session negotiation; must be the first request on a connection.
    Connect { page_size: u64, memory_size: u64 },
    /// Demand fetch of the page at `offset`.
    Fetch { offset: u64 },
    /// Write-back of the page at `offset`; `data` is exactly one page.
    Sync { offset: u64, data: Bytes },
    /// Session teardown announcement.
    Disconnect,
}

impl Request {
    /// The wire opcode this request travels under.
    pub fn opcode(&self) -> Opcode {
        match self {
            Request::Connect { .. } => Opcode::Connect,
            Request::Fetch { .. } => Opcode::RequestPage,
            Request::Sync { .. } => Opcode::SyncPage,
            Request::Disconnect => Opcode::Disconnect,
        }
    }
}

/// A server response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Handshake accepted.
    Ack,
    /// Handshake rejected.
    Nack,
    /// Raw page content answering a fetch; exactly one page, no status byte.
    Page(Bytes),
    /// Sync applied.
    SyncOk,
    /// Sync rejected.
    SyncErr,
}

/// Encode a CONNECT frame.
pub fn encode_connect(page_size: u64, memory_size: u64) -> [u8; CONNECT_FRAME_LEN] {
    let mut frame = [0u8; CONNECT_FRAME_LEN];
    frame[0] = Opcode::Connect.as_byte();
    frame[1..9].copy_from_slice(&page_size.to_le_bytes());
    frame[9..17].copy_from_slice(&memory_size.to_le_bytes());
    frame
}

/// Encode a REQUEST_PAGE frame. Allocation-free; safe to call from the
/// fault handler.
pub fn encode_fetch(offset: u64) -> [u8; FETCH_FRAME_LEN] {
    let mut frame = [0u8; FETCH_FRAME_LEN];
    frame[0] = Opcode::RequestPage.as_byte();
    frame[1..9].copy_from_slice(&offset.to_le_bytes());
    frame
}

/// Encode the header of a SYNC_PAGE frame; the caller sends the page payload
/// immediately after it.
pub fn encode_sync_header(offset: u64) -> [u8; SYNC_HEADER_LEN] {
    let mut frame = [0u8; SYNC_HEADER_LEN];
    frame[0] = Opcode::SyncPage.as_byte();
    frame[1..9].copy_from_slice(&offset.to_le_bytes());
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_frame_layout() {
        let frame = encode_connect(4096, 0x10000);
        assert_eq!(frame[0], 0xA0);
        assert_eq!(u64::from_le_bytes(frame[1..9].try_into().unwrap()), 4096);
        assert_eq!(u64::from_le_bytes(frame[9..17].try_into().unwrap()), 0x10000);
    }

    #[test]
    fn test_fetch_frame_is_little_endian() {
        let frame = encode_fetch(0x0102_0304_0506_0708);
        assert_eq!(frame[0], 0x80);
        // LSB first on the wire
        assert_eq!(&frame[1..9], &[0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_sync_header_layout() {
        let frame = encode_sync_header(0x3000);
        assert_eq!(frame[0], 0x90);
        assert_eq!(u64::from_le_bytes(frame[1..9].try_into().unwrap()), 0x3000);
    }

    #[test]
    fn test_disconnect_frame() {
        assert_eq!(DISCONNECT_FRAME, [Opcode::Disconnect.as_byte()]);
    }

    #[test]
    fn test_request_opcode_mapping() {
        let sync = Request::Sync {
            offset: 0,
            data: Bytes::from_static(&[0u8; 16]),
        };
        assert_eq!(sync.opcode(), Opcode::SyncPage);
        assert_eq!(Request::Disconnect.opcode(), Opcode::Disconnect);
        assert_eq!(Request::Fetch { offset: 0 }.opcode(), Opcode::RequestPage);
        assert_eq!(
            Request::Connect {
                page_size: 0,
                memory_size: 0
            }
            .opcode(),
            Opcode::Connect
        );
    }
}
