//! Forwarding client
//!
//! Opens one outbound TCP connection per call, sends the raw request
//! bytes, and reads the response either to EOF (ordinary fetches) or as a
//! single bounded read (conditional-GET probes, where a 304 has no body
//! and a full read would wait forever).

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::BUFFER_SIZE;
use crate::error::ProxyError;

/// Forward `request` to `host:port` and return the origin's response.
///
/// `full_read = true` reads until the origin closes the connection;
/// `full_read = false` performs exactly one read of up to [`BUFFER_SIZE`]
/// bytes. A connect or send failure is an error; a failed read yields an
/// empty response. The outbound socket is closed before returning.
pub async fn forward(
    request: &[u8],
    host: &str,
    port: u16,
    full_read: bool,
) -> Result<Vec<u8>, ProxyError> {
    let mut origin = TcpStream::connect((host, port))
        .await
        .map_err(|e| ProxyError::connection(host, port, e))?;

    origin
        .write_all(request)
        .await
        .map_err(|e| ProxyError::connection(host, port, e))?;

    let mut response = Vec::new();
    if full_read {
        if origin.read_to_end(&mut response).await.is_err() {
            response.clear();
        }
    } else {
        let mut buf = vec![0u8; BUFFER_SIZE];
        if let Ok(n) = origin.read(&mut buf).await {
            response.extend_from_slice(&buf[..n]);
        }
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    /// Origin that answers one connection with `response`, optionally
    /// dribbling it out in two writes before closing.
    async fn spawn_origin(response: Vec<u8>, split_writes: bool) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; BUFFER_SIZE];
            let _ = sock.read(&mut buf).await;

            if split_writes {
                let mid = response.len() / 2;
                sock.write_all(&response[..mid]).await.unwrap();
                sock.flush().await.unwrap();
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                sock.write_all(&response[mid..]).await.unwrap();
            } else {
                sock.write_all(&response).await.unwrap();
            }
        });

        addr
    }

    #[tokio::test]
    async fn test_full_read_collects_until_close() {
        let body = b"HTTP/1.1 200 OK\r\n\r\nhello world".to_vec();
        let addr = spawn_origin(body.clone(), true).await;

        let response = forward(b"GET / HTTP/1.1\r\n\r\n", "127.0.0.1", addr.port(), true)
            .await
            .unwrap();
        assert_eq!(response, body);
    }

    #[tokio::test]
    async fn test_single_read_returns_first_buffer() {
        let head = b"HTTP/1.1 304 Not Modified\r\n\r\n".to_vec();
        let addr = spawn_origin(head.clone(), false).await;

        let response = forward(b"GET / HTTP/1.1\r\n\r\n", "127.0.0.1", addr.port(), false)
            .await
            .unwrap();
        assert_eq!(response, head);
    }

    #[tokio::test]
    async fn test_connect_failure_is_an_error() {
        // Bind then drop to get a port with no listener behind it.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = forward(b"GET / HTTP/1.1\r\n\r\n", "127.0.0.1", port, true).await;
        assert!(matches!(result, Err(ProxyError::Connection { .. })));
    }
}
