//! # Transport Layer
//!
//! Byte movement between the paging peers.
//!
//! The server side frames its traffic with
//! [`crate::protocol::RequestCodec`] over tokio; the client side uses the
//! blocking primitives in [`blocking`], because a page fetch has to run to
//! completion inside a fault handler where no executor is available.
//!
//! ## Components
//! - **Blocking**: full-transfer send/receive primitives on a raw socket fd

pub mod blocking;
