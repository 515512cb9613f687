//! Forward proxy module
//!
//! Connection handling, the response cache with conditional revalidation,
//! the block list, and the opaque CONNECT tunnel relay.

mod blocklist;
mod cache;
mod server;
mod tunnel;

pub use blocklist::{BlockList, BLOCKED_RESPONSE};
pub use cache::{CacheEntry, CacheStore, Revalidation};
pub use server::ProxyServer;
pub use tunnel::CONNECTION_ESTABLISHED;
