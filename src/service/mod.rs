//! # Service Layer
//!
//! The two protocol peers and the state they manage.
//!
//! ## Components
//! - **Server**: accept loop and request dispatcher, one connection at a time
//! - **Store**: the authoritative backing store for one session
//! - **Client**: blocking protocol client driving the four exchanges
//!
//! The demand-paging client most callers want is
//! [`crate::region::Session`], which layers the fault trap and region
//! management on top of [`client::PageClient`].

pub mod client;
pub mod server;
pub mod store;

pub use client::PageClient;
pub use server::PageServer;
pub use store::BackingStore;
