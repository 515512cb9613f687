//! Proxy events
//!
//! The core reports everything log-worthy as a `ProxyEvent` on an mpsc
//! channel supplied at construction. A presentation layer subscribes on
//! the receiving end; [`log_drain`] provides the default sink that routes
//! events to the tracing subscriber. Emission never blocks a connection
//! handler: if the channel is full the event is dropped.

use std::fmt;
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// A log-worthy occurrence inside the proxy core
#[derive(Debug, Clone)]
pub enum ProxyEvent {
    /// Listener bound and accepting
    Started { addr: SocketAddr, backlog: u32 },

    /// Client connection accepted
    ConnectionAccepted { peer: SocketAddr },

    /// Client connection finished, successfully or not
    ConnectionClosed { peer: SocketAddr, elapsed_ms: u64 },

    /// Request refused because its target is on the block list
    RequestBlocked { target: String },

    /// Cached bytes served after a 304 revalidation
    CacheServed {
        target: String,
        /// Previous fetch latency minus this request's elapsed time.
        /// Can be negative when the probe was slower than the fetch.
        time_saved_secs: f64,
    },

    /// Fresh origin response stored (new entry or wholesale overwrite)
    CacheStored { target: String, fetch_ms: u64 },

    /// CONNECT tunnel established to an origin
    TunnelOpened { host: String, port: u16 },
}

impl fmt::Display for ProxyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyEvent::Started { addr, backlog } => {
                write!(f, "Proxy server started on {} (backlog {})", addr, backlog)
            }
            ProxyEvent::ConnectionAccepted { peer } => {
                write!(f, "Accepted connection from {}", peer)
            }
            ProxyEvent::ConnectionClosed { peer, elapsed_ms } => {
                write!(f, "Closed connection from {} after {}ms", peer, elapsed_ms)
            }
            ProxyEvent::RequestBlocked { target } => {
                write!(f, "Blocked request for {}", target)
            }
            ProxyEvent::CacheServed {
                target,
                time_saved_secs,
            } => {
                write!(
                    f,
                    "Served {} from cache, saved {:.3}s",
                    target, time_saved_secs
                )
            }
            ProxyEvent::CacheStored { target, fetch_ms } => {
                write!(f, "Cached {} ({}ms fetch)", target, fetch_ms)
            }
            ProxyEvent::TunnelOpened { host, port } => {
                write!(f, "Opened tunnel to {}:{}", host, port)
            }
        }
    }
}

/// Send an event without blocking; a full or closed channel drops it.
pub fn emit(tx: &mpsc::Sender<ProxyEvent>, event: ProxyEvent) {
    if let Err(e) = tx.try_send(event) {
        tracing::debug!("Dropping proxy event: {}", e);
    }
}

/// Default event sink: forwards every event to the tracing subscriber.
///
/// Used when no presentation layer supplies its own receiver.
pub fn log_drain() -> mpsc::Sender<ProxyEvent> {
    let (tx, mut rx) = mpsc::channel(256);
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            tracing::info!("{}", event);
        }
    });
    tx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lines() {
        let event = ProxyEvent::CacheServed {
            target: "http://example.com/".to_string(),
            time_saved_secs: 0.5,
        };
        assert_eq!(
            event.to_string(),
            "Served http://example.com/ from cache, saved 0.500s"
        );

        let event = ProxyEvent::RequestBlocked {
            target: "http://blocked.test/".to_string(),
        };
        assert_eq!(event.to_string(), "Blocked request for http://blocked.test/");
    }

    #[test]
    fn test_negative_savings_render() {
        let event = ProxyEvent::CacheServed {
            target: "/".to_string(),
            time_saved_secs: -0.25,
        };
        assert!(event.to_string().contains("-0.250s"));
    }

    #[tokio::test]
    async fn test_emit_drops_on_full_channel() {
        let (tx, _rx) = mpsc::channel(1);
        emit(
            &tx,
            ProxyEvent::RequestBlocked {
                target: "/a".into(),
            },
        );
        // Channel now full; this must not block or panic.
        emit(
            &tx,
            ProxyEvent::RequestBlocked {
                target: "/b".into(),
            },
        );
    }
}
