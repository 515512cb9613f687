//! Block list
//!
//! A shared set of request-line targets the proxy refuses to serve.
//! The control surface mutates it while connection handlers read it, so
//! the set lives behind a lock and values are compared verbatim — no URL
//! normalization on either side.

use parking_lot::RwLock;
use std::collections::HashSet;

/// Response sent for any blocked target, byte-for-byte.
pub const BLOCKED_RESPONSE: &[u8] = b"HTTP/1.1 403 Forbidden\r\n\
Content-Type: text/html\r\n\r\n\
<html><head><title>403 Forbidden</title></head><body><h1>403 Forbidden</h1><p>This page has been blocked by the proxy server.</p></body></html>";

/// Set of blocked request-line targets
#[derive(Default)]
pub struct BlockList {
    urls: RwLock<HashSet<String>>,
}

impl BlockList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target; returns false if it was already blocked.
    pub fn add(&self, url: &str) -> bool {
        self.urls.write().insert(url.to_string())
    }

    /// Remove a target; returns false if it was not blocked.
    pub fn remove(&self, url: &str) -> bool {
        self.urls.write().remove(url)
    }

    /// Check whether a request-line target is blocked.
    pub fn contains(&self, url: &str) -> bool {
        self.urls.read().contains(url)
    }

    /// Snapshot of all blocked targets.
    pub fn all(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.urls.read().iter().cloned().collect();
        urls.sort();
        urls
    }

    pub fn len(&self) -> usize {
        self.urls.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.read().is_empty()
    }

    pub fn clear(&self) {
        self.urls.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_remove_contains() {
        let list = BlockList::new();
        assert!(!list.contains("http://blocked.test/"));

        assert!(list.add("http://blocked.test/"));
        assert!(!list.add("http://blocked.test/"));
        assert!(list.contains("http://blocked.test/"));
        assert_eq!(list.len(), 1);

        assert!(list.remove("http://blocked.test/"));
        assert!(!list.remove("http://blocked.test/"));
        assert!(list.is_empty());
    }

    #[test]
    fn test_targets_compared_verbatim() {
        let list = BlockList::new();
        list.add("http://blocked.test/");

        // No normalization: trailing slash and case both matter.
        assert!(!list.contains("http://blocked.test"));
        assert!(!list.contains("http://BLOCKED.test/"));
    }

    #[test]
    fn test_blocked_response_bytes() {
        let text = std::str::from_utf8(BLOCKED_RESPONSE).unwrap();
        assert!(text.starts_with("HTTP/1.1 403 Forbidden\r\n"));
        assert!(text.contains("Content-Type: text/html\r\n\r\n"));
        assert!(text.ends_with(
            "<p>This page has been blocked by the proxy server.</p></body></html>"
        ));
    }
}
