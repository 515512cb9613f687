//! HTTP plumbing
//!
//! Raw-byte message parsing and the outbound forwarding client. Nothing
//! here frames or rewrites traffic; responses travel verbatim.

pub mod client;
pub mod message;

/// Buffer size for single-read receives and tunnel relaying
pub const BUFFER_SIZE: usize = 8192;
