//! # netmem
//!
//! Network-backed virtual memory: demand paging over TCP.
//!
//! A client reserves a region of its address space with no local backing and
//! transparently fetches the content of any page from a remote server the
//! instant the page is first touched, using ordinary load/store instructions.
//! Writes stay local until explicitly pushed back. The mechanism is a minimal
//! distributed shared-memory / remote-paging engine:
//!
//! ```text
//!   application          client                          server
//!   -----------          ------                          ------
//!   load [addr]  --SEGV-> fault trap
//!                         mprotect page RW
//!                         REQUEST_PAGE(offset)  ------->  dispatcher
//!                         page bytes            <-------  backing store
//!                         (instruction retried)
//!   load [addr]  ------>  plain memory access
//! ```
//!
//! ## Components
//! - [`region::Session`]: the demand-paged region most callers want
//! - [`service::PageServer`]: accept loop and request dispatcher
//! - [`service::PageClient`]: the bare blocking protocol client
//! - [`protocol`]: opcode table, frames, and the server-side codec
//! - [`config`]: TOML/env configuration with validation
//!
//! ## Server
//! ```no_run
//! use netmem::config::ServerConfig;
//! use netmem::service::PageServer;
//!
//! #[tokio::main]
//! async fn main() -> netmem::error::Result<()> {
//!     let server = PageServer::bind(ServerConfig::default()).await?;
//!     server.run().await
//! }
//! ```
//!
//! ## Client
//! ```no_run
//! use netmem::region::Session;
//!
//! fn main() -> netmem::error::Result<()> {
//!     let mut session = Session::connect("127.0.0.1:6502", 64 * 1024)?;
//!
//!     // First touch of a page blocks on the fetch, then reads normally.
//!     let byte = session.as_slice()[0x300A];
//!     println!("offset 0x300A holds {byte:#04x}");
//!
//!     // Local writes are pushed back explicitly.
//!     session.as_mut_slice()[0x3000..0x3004].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
//!     session.sync_page(0x3000)?;
//!
//!     session.disconnect()
//! }
//! ```
//!
//! ## Constraints
//! - One session per process (the SIGSEGV disposition is process-wide), and
//!   the session is single-threaded by construction (`!Send + !Sync`).
//! - The protocol is strictly synchronous with no timeouts; a hung peer
//!   blocks its caller.
//! - Any transport error is fatal to the session. There is no retry layer.

pub mod config;
pub mod error;
pub mod protocol;
pub mod region;
pub mod service;
pub mod transport;
pub mod utils;

pub use config::NetmemConfig;
pub use error::{NetmemError, Result};
pub use region::Session;
pub use service::{PageClient, PageServer};
