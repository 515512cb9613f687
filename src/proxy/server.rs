//! Proxy server: listener and per-connection handler
//!
//! The listener accepts indefinitely and spawns one task per connection.
//! Each task runs the connection state machine: receive one request,
//! classify it (blocked / cached / CONNECT / direct), respond, close.
//! Every failure is contained to its own connection.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpSocket, TcpStream};
use tokio::sync::{mpsc, Semaphore};

use super::blocklist::{BlockList, BLOCKED_RESPONSE};
use super::cache::{CacheStore, Revalidation};
use super::tunnel;
use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::events::{self, ProxyEvent};
use crate::http::{client, message, BUFFER_SIZE};

/// Synthesized response when an origin cannot be reached. The original
/// design left this case undefined; answering 502 is documented new
/// behavior.
const BAD_GATEWAY_RESPONSE: &[u8] = b"HTTP/1.1 502 Bad Gateway\r\n\
Content-Type: text/html\r\n\r\n\
<html><head><title>502 Bad Gateway</title></head><body><h1>502 Bad Gateway</h1><p>The proxy server could not reach the origin server.</p></body></html>";

/// Caching forward proxy server
pub struct ProxyServer {
    /// Configuration
    config: ProxyConfig,

    /// Shared response cache
    cache: Arc<CacheStore>,

    /// Shared block list
    blocklist: Arc<BlockList>,

    /// Event sender
    event_tx: mpsc::Sender<ProxyEvent>,

    /// Optional connection cap; `None` is the unbounded
    /// task-per-connection model
    limiter: Option<Arc<Semaphore>>,

    /// Server running flag
    running: Arc<AtomicBool>,
}

impl ProxyServer {
    /// Create a new proxy server.
    pub fn new(config: ProxyConfig, event_tx: mpsc::Sender<ProxyEvent>) -> Self {
        let limiter = config
            .max_connections
            .map(|n| Arc::new(Semaphore::new(n)));

        Self {
            config,
            cache: Arc::new(CacheStore::new()),
            blocklist: Arc::new(BlockList::new()),
            event_tx,
            limiter,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the proxy server and return the bound address.
    pub async fn start(&self) -> Result<SocketAddr> {
        let addr: SocketAddr = format!("{}:{}", self.config.listen_addr, self.config.port)
            .parse()
            .context("Invalid listen address")?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .context("Failed to create listener socket")?;
        socket.bind(addr).context("Failed to bind proxy server")?;

        let listener = socket
            .listen(self.config.backlog)
            .context("Failed to listen")?;
        let local_addr = listener.local_addr().context("No local address")?;

        tracing::info!("Proxy server listening on {}", local_addr);

        self.running.store(true, Ordering::SeqCst);
        events::emit(
            &self.event_tx,
            ProxyEvent::Started {
                addr: local_addr,
                backlog: self.config.backlog,
            },
        );

        let cache = self.cache.clone();
        let blocklist = self.blocklist.clone();
        let event_tx = self.event_tx.clone();
        let limiter = self.limiter.clone();
        let running = self.running.clone();
        let config = self.config.clone();

        // Spawn the accept loop
        tokio::spawn(async move {
            while running.load(Ordering::SeqCst) {
                let permit = match &limiter {
                    Some(semaphore) => match semaphore.clone().acquire_owned().await {
                        Ok(permit) => Some(permit),
                        Err(_) => break,
                    },
                    None => None,
                };

                match listener.accept().await {
                    Ok((stream, peer_addr)) => {
                        tracing::debug!("New connection from {}", peer_addr);
                        events::emit(
                            &event_tx,
                            ProxyEvent::ConnectionAccepted { peer: peer_addr },
                        );

                        let cache = cache.clone();
                        let blocklist = blocklist.clone();
                        let event_tx = event_tx.clone();
                        let config = config.clone();

                        tokio::spawn(async move {
                            let _permit = permit;
                            let started = Instant::now();

                            if let Err(e) =
                                handle_connection(stream, cache, blocklist, config, &event_tx)
                                    .await
                            {
                                tracing::warn!("Connection error from {}: {}", peer_addr, e);
                            }

                            events::emit(
                                &event_tx,
                                ProxyEvent::ConnectionClosed {
                                    peer: peer_addr,
                                    elapsed_ms: started.elapsed().as_millis() as u64,
                                },
                            );
                        });
                    }
                    Err(e) => {
                        tracing::error!("Accept error: {}", e);
                    }
                }
            }
        });

        Ok(local_addr)
    }

    /// Stop accepting new connections. In-flight connections run to
    /// completion.
    pub async fn stop(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("Proxy server stopped");
        Ok(())
    }

    /// Check if the server is accepting connections.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the shared response cache.
    pub fn cache(&self) -> Arc<CacheStore> {
        self.cache.clone()
    }

    /// Get the shared block list.
    pub fn blocklist(&self) -> Arc<BlockList> {
        self.blocklist.clone()
    }

    /// Block a request-line target.
    pub fn add_blocked(&self, url: &str) -> bool {
        self.blocklist.add(url)
    }

    /// Unblock a request-line target.
    pub fn remove_blocked(&self, url: &str) -> bool {
        self.blocklist.remove(url)
    }

    /// Snapshot of the blocked targets.
    pub fn blocked_urls(&self) -> Vec<String> {
        self.blocklist.all()
    }
}

/// Handle a single client connection.
async fn handle_connection(
    mut stream: TcpStream,
    cache: Arc<CacheStore>,
    blocklist: Arc<BlockList>,
    config: ProxyConfig,
    event_tx: &mpsc::Sender<ProxyEvent>,
) -> Result<(), ProxyError> {
    let start = Instant::now();

    // RECEIVE: one bounded read. Zero bytes means the client closed
    // before sending anything.
    let mut buf = vec![0u8; BUFFER_SIZE];
    let n = stream.read(&mut buf).await?;
    if n == 0 {
        return Ok(());
    }
    buf.truncate(n);
    let request = buf;

    // PARSE: a request line without a target aborts the connection
    // without a response.
    let request_text = String::from_utf8_lossy(&request).to_string();
    let target = message::extract_target(&request_text)?;
    let host = message::extract_host(&request_text);
    let method = message::extract_method(&request_text).to_string();

    tracing::debug!("{} {} (host {})", method, target, host);

    let result = dispatch(
        &mut stream,
        &request,
        &method,
        &target,
        &host,
        &cache,
        &blocklist,
        &config,
        event_tx,
        start,
    )
    .await;

    // Origin unreachable on a non-CONNECT path: answer 502 before
    // closing. CONNECT failures close the client silently.
    if matches!(result, Err(ProxyError::Connection { .. })) && method != "CONNECT" {
        let _ = stream.write_all(BAD_GATEWAY_RESPONSE).await;
    }

    result
}

/// CLASSIFY and RESPOND. Priority: blocked, then cached, then CONNECT,
/// then direct fetch.
#[allow(clippy::too_many_arguments)]
async fn dispatch(
    stream: &mut TcpStream,
    request: &[u8],
    method: &str,
    target: &str,
    host: &str,
    cache: &CacheStore,
    blocklist: &BlockList,
    config: &ProxyConfig,
    event_tx: &mpsc::Sender<ProxyEvent>,
    start: Instant,
) -> Result<(), ProxyError> {
    if blocklist.contains(target) {
        // A CONNECT client expects the 200 line before anything else;
        // honor that, then refuse over the same socket. No tunnel opens.
        if method == "CONNECT" {
            stream.write_all(tunnel::CONNECTION_ESTABLISHED).await?;
        }
        stream.write_all(BLOCKED_RESPONSE).await?;
        events::emit(
            event_tx,
            ProxyEvent::RequestBlocked {
                target: target.to_string(),
            },
        );
        return Ok(());
    }

    if let Some(entry) = cache.lookup(target) {
        match cache.revalidate(target, host, config.http_port).await? {
            Revalidation::NotModified => {
                stream.write_all(&entry.raw_response).await?;

                let time_saved_secs =
                    entry.fetch_latency.as_secs_f64() - start.elapsed().as_secs_f64();
                events::emit(
                    event_tx,
                    ProxyEvent::CacheServed {
                        target: target.to_string(),
                        time_saved_secs,
                    },
                );
                return Ok(());
            }
            Revalidation::Fresh => {
                return fetch_and_serve(
                    stream, request, target, host, config, cache, event_tx, start,
                )
                .await;
            }
        }
    }

    if method == "CONNECT" {
        let mut origin = tunnel::open(host, config.https_port).await?;
        stream.write_all(tunnel::CONNECTION_ESTABLISHED).await?;
        events::emit(
            event_tx,
            ProxyEvent::TunnelOpened {
                host: host.to_string(),
                port: config.https_port,
            },
        );
        return tunnel::relay(stream, &mut origin).await;
    }

    fetch_and_serve(stream, request, target, host, config, cache, event_tx, start).await
}

/// Full fetch from the origin, respond, and overwrite the cache entry.
#[allow(clippy::too_many_arguments)]
async fn fetch_and_serve(
    stream: &mut TcpStream,
    request: &[u8],
    target: &str,
    host: &str,
    config: &ProxyConfig,
    cache: &CacheStore,
    event_tx: &mpsc::Sender<ProxyEvent>,
    start: Instant,
) -> Result<(), ProxyError> {
    let response = client::forward(request, host, config.http_port, true).await?;
    stream.write_all(&response).await?;

    let fetch_latency = start.elapsed();
    let last_modified = message::extract_last_modified(&response);
    cache.put(target, response, last_modified, fetch_latency);

    events::emit(
        event_tx,
        ProxyEvent::CacheStored {
            target: target.to_string(),
            fetch_ms: fetch_latency.as_millis() as u64,
        },
    );
    Ok(())
}
