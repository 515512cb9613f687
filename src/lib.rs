//! cachegate — caching forward HTTP/HTTPS proxy
//!
//! Accepts proxy-form HTTP/1.1 requests, refuses targets on a shared
//! block list, caches origin responses with conditional-GET
//! revalidation, and tunnels CONNECT traffic as opaque bytes. The core
//! reports everything log-worthy as [`events::ProxyEvent`] values so a
//! presentation layer can subscribe without living inside the proxy.

pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod proxy;

pub use config::ProxyConfig;
pub use error::ProxyError;
pub use events::{log_drain, ProxyEvent};
pub use proxy::{BlockList, CacheEntry, CacheStore, ProxyServer};
