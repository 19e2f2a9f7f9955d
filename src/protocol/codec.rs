//! # Server-Side Codec
//!
//! A stateful [`Decoder`]/[`Encoder`] pair framing client requests and server
//! responses over a TCP stream, for use with `tokio_util::codec::Framed`.
//!
//! The codec mirrors the fixed wire layout in [`crate::protocol`]: every frame
//! starts with an opcode byte, 64-bit values are little-endian, and a
//! `SYNC_PAGE` frame carries exactly one page of payload. Because the payload
//! length is the page size negotiated at connect time, the decoder starts out
//! only able to parse `CONNECT` and learns the page size when the server
//! accepts the handshake (`set_page_size`). A sync frame arriving before that
//! is a protocol violation, as is any unknown opcode.
//!
//! End-of-stream with a partially buffered frame is a transport error; a clean
//! close between frames ends the stream normally.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::NetmemError;

use super::frame::{Request, Response, CONNECT_FRAME_LEN, FETCH_FRAME_LEN, SYNC_HEADER_LEN};
use super::opcode::{
    Opcode, STATUS_ACK, STATUS_NACK, STATUS_SYNC_ERR, STATUS_SYNC_OK,
};

/// Decoder for client requests and encoder for server responses.
#[derive(Debug, Default)]
pub struct RequestCodec {
    /// Negotiated page size; set once the handshake is accepted.
    page_size: Option<usize>,
}

impl RequestCodec {
    /// Create a codec that has not yet seen an accepted handshake.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the negotiated page size so `SYNC_PAGE` payloads can be framed.
    pub fn set_page_size(&mut self, page_size: u64) {
        self.page_size = Some(page_size as usize);
    }

    /// The negotiated page size, if the handshake has been accepted.
    pub fn page_size(&self) -> Option<u64> {
        self.page_size.map(|ps| ps as u64)
    }
}

impl Decoder for RequestCodec {
    type Item = Request;
    type Error = NetmemError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Request>, NetmemError> {
        let Some(&opcode_byte) = src.first() else {
            return Ok(None);
        };

        let opcode = Opcode::from_byte(opcode_byte)
            .ok_or(NetmemError::UnexpectedOpcode { opcode: opcode_byte })?;

        match opcode {
            Opcode::Connect => {
                if src.len() < CONNECT_FRAME_LEN {
                    src.reserve(CONNECT_FRAME_LEN - src.len());
                    return Ok(None);
                }
                src.advance(1);
                let page_size = src.get_u64_le();
                let memory_size = src.get_u64_le();
                Ok(Some(Request::Connect {
                    page_size,
                    memory_size,
                }))
            }
            Opcode::RequestPage => {
                if src.len() < FETCH_FRAME_LEN {
                    src.reserve(FETCH_FRAME_LEN - src.len());
                    return Ok(None);
                }
                src.advance(1);
                let offset = src.get_u64_le();
                Ok(Some(Request::Fetch { offset }))
            }
            Opcode::SyncPage => {
                // Payload length is unknown until a handshake has been accepted.
                let page_size = self
                    .page_size
                    .ok_or(NetmemError::UnexpectedOpcode { opcode: opcode_byte })?;
                let frame_len = SYNC_HEADER_LEN + page_size;
                if src.len() < frame_len {
                    src.reserve(frame_len - src.len());
                    return Ok(None);
                }
                src.advance(1);
                let offset = src.get_u64_le();
                let data = src.split_to(page_size).freeze();
                Ok(Some(Request::Sync { offset, data }))
            }
            Opcode::Disconnect => {
                src.advance(1);
                Ok(Some(Request::Disconnect))
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Request>, NetmemError> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            // Peer closed mid-frame.
            None => Err(NetmemError::PeerClosed),
        }
    }
}

impl Encoder<Response> for RequestCodec {
    type Error = NetmemError;

    fn encode(&mut self, item: Response, dst: &mut BytesMut) -> Result<(), NetmemError> {
        match item {
            Response::Ack => dst.put_u8(STATUS_ACK),
            Response::Nack => dst.put_u8(STATUS_NACK),
            Response::Page(data) => dst.extend_from_slice(&data),
            Response::SyncOk => dst.put_u8(STATUS_SYNC_OK),
            Response::SyncErr => dst.put_u8(STATUS_SYNC_ERR),
        }
        Ok(())
    }
}
