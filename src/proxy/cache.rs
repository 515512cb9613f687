//! Response cache with conditional-GET revalidation
//!
//! Entries are keyed by the raw request-line target and replaced wholesale
//! on every successful non-304 fetch. The store is process-lifetime and
//! unbounded; nothing here evicts.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::ProxyError;
use crate::http::{client, message};

/// A cached origin response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Verbatim response bytes as received from the origin
    pub raw_response: Vec<u8>,

    /// `Last-Modified` marker sent back on revalidation probes
    pub last_modified: Vec<u8>,

    /// Wall-clock time the original fetch took, for savings reports
    pub fetch_latency: Duration,

    /// When the entry was stored
    pub stored_at: DateTime<Utc>,
}

/// Outcome of a revalidation probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revalidation {
    /// Origin replied 304; the stored bytes are still good.
    NotModified,
    /// Anything else; the caller must re-fetch in full. The probe bytes
    /// are discarded — a single bounded read may have truncated them.
    Fresh,
}

/// Shared response cache
#[derive(Default)]
pub struct CacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the entry for a target, cloned out of the store.
    pub fn lookup(&self, target: &str) -> Option<CacheEntry> {
        self.entries.read().get(target).cloned()
    }

    /// Probe the origin with a conditional GET for a cached target.
    ///
    /// The probe is sent in single-read mode: a 304 carries no body, so a
    /// read-until-close would never return. Only the status code of the
    /// probe is used.
    pub async fn revalidate(
        &self,
        target: &str,
        host: &str,
        port: u16,
    ) -> Result<Revalidation, ProxyError> {
        let last_modified = match self.lookup(target) {
            Some(entry) => entry.last_modified,
            // Entry vanished between lookup and probe; treat as a miss.
            None => return Ok(Revalidation::Fresh),
        };

        let probe = format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nIf-Modified-Since: {}\r\n\r\n",
            target,
            host,
            String::from_utf8_lossy(&last_modified),
        );

        let response = client::forward(probe.as_bytes(), host, port, false).await?;

        if message::extract_status_code(&response) == b"304" {
            Ok(Revalidation::NotModified)
        } else {
            Ok(Revalidation::Fresh)
        }
    }

    /// Store a response, unconditionally overwriting any existing entry.
    pub fn put(
        &self,
        target: &str,
        raw_response: Vec<u8>,
        last_modified: Vec<u8>,
        fetch_latency: Duration,
    ) {
        let entry = CacheEntry {
            raw_response,
            last_modified,
            fetch_latency,
            stored_at: Utc::now(),
        };
        self.entries.write().insert(target.to_string(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
