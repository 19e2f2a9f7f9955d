//! # Protocol Client
//!
//! Blocking client for the paging protocol, one exchange at a time over a
//! single persistent TCP stream.
//!
//! The client is deliberately synchronous: page fetches are issued from the
//! fault path, where blocking until the full payload has arrived is the whole
//! point. Methods take `&mut self` because the protocol permits only one
//! outstanding request.
//!
//! The fault handler itself does not call these methods; it drives the wire
//! primitives directly on [`raw_fd`](PageClient::raw_fd) so the fetch path
//! stays allocation-free.

use std::net::{TcpStream, ToSocketAddrs};
use std::os::fd::{AsRawFd, RawFd};

use tracing::debug;

use crate::error::{NetmemError, Result};
use crate::protocol::frame::{
    encode_connect, encode_fetch, encode_sync_header, DISCONNECT_FRAME,
};
use crate::protocol::opcode::{STATUS_ACK, STATUS_NACK, STATUS_SYNC_ERR, STATUS_SYNC_OK};
use crate::transport::blocking;

/// A negotiated paging session from the client side.
#[derive(Debug)]
pub struct PageClient {
    stream: TcpStream,
    page_size: u64,
    memory_size: u64,
}

impl PageClient {
    /// Connect to a page server and run the CONNECT handshake.
    ///
    /// A NACK is a hard failure; the server closes the connection and a
    /// retry means dialing again.
    pub fn connect<A: ToSocketAddrs>(addr: A, page_size: u64, memory_size: u64) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;

        let fd = stream.as_raw_fd();
        blocking::send_all(fd, &encode_connect(page_size, memory_size))?;
        match blocking::recv_byte(fd)? {
            STATUS_ACK => {
                debug!(page_size, memory_size, "Session negotiated");
                Ok(Self {
                    stream,
                    page_size,
                    memory_size,
                })
            }
            STATUS_NACK => Err(NetmemError::NegotiationRejected {
                page_size,
                memory_size,
            }),
            status => Err(NetmemError::UnexpectedStatus { status }),
        }
    }

    /// The page size this session negotiated.
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// The region size this session negotiated.
    pub fn memory_size(&self) -> u64 {
        self.memory_size
    }

    /// The connection's descriptor, for the fault path's direct wire access.
    pub fn raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    /// Fetch the page at `offset` into `buf`, blocking until the full page
    /// has arrived. `buf` must be exactly one page.
    pub fn fetch_page_into(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        debug_assert_eq!(buf.len() as u64, self.page_size);
        let fd = self.stream.as_raw_fd();
        blocking::send_all(fd, &encode_fetch(offset))?;
        blocking::recv_exact(fd, buf)?;
        Ok(())
    }

    /// Push one page back to the server's store. `data` must be exactly one
    /// page.
    pub fn sync_page(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        debug_assert_eq!(data.len() as u64, self.page_size);
        let fd = self.stream.as_raw_fd();
        blocking::send_all(fd, &encode_sync_header(offset))?;
        blocking::send_all(fd, data)?;
        match blocking::recv_byte(fd)? {
            STATUS_SYNC_OK => {
                debug!(offset = format_args!("{offset:#x}"), "Page synced");
                Ok(())
            }
            STATUS_SYNC_ERR => Err(NetmemError::SyncRejected { offset }),
            status => Err(NetmemError::UnexpectedStatus { status }),
        }
    }

    /// Announce teardown. No response is awaited; the stream closes on drop.
    pub fn disconnect(mut self) -> Result<()> {
        self.send_disconnect()
    }

    pub(crate) fn send_disconnect(&mut self) -> Result<()> {
        blocking::send_all(self.stream.as_raw_fd(), &DISCONNECT_FRAME)?;
        debug!("Session disconnected");
        Ok(())
    }
}
