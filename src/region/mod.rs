//! # Region Management
//!
//! The client's reserved address range and the machinery that fills it.
//!
//! ## Components
//! - **Mapping**: RAII ownership of the `PROT_NONE` reservation
//! - **Fault**: process-wide SIGSEGV trap resolving first-touch faults
//! - **Session**: the public demand-paging handle tying mapping, trap, and
//!   protocol client together
//!
//! Page state is implicit: an unmapped page is `PROT_NONE` and faults on
//! touch, a resident page is `PROT_READ|PROT_WRITE`. The access-control
//! hardware is the page table; there is no separate bookkeeping.

mod fault;
pub mod mapping;
pub mod session;

pub use mapping::{host_page_size, RegionMapping};
pub use session::Session;
