//! HTTPS tunnel relay
//!
//! After a CONNECT handshake the proxy is a dumb pipe: bytes move verbatim
//! in both directions until either side closes, and neither direction is
//! parsed or re-framed. There is no timeout — a half-open peer that never
//! sends keeps the relay alive, matching the proxy's no-deadline model.

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::error::ProxyError;

/// Confirmation line written to the client once the origin leg is up.
pub const CONNECTION_ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection Established\r\n\r\n";

/// Open the origin leg of a tunnel.
///
/// Any port in the CONNECT target is ignored; `port` comes from
/// configuration (default 443).
pub async fn open(host: &str, port: u16) -> Result<TcpStream, ProxyError> {
    TcpStream::connect((host, port))
        .await
        .map_err(|e| ProxyError::connection(host, port, e))
}

/// Pump bytes between the client and origin until either side closes,
/// then shut down both sockets.
pub async fn relay(client: &mut TcpStream, origin: &mut TcpStream) -> Result<(), ProxyError> {
    {
        let (mut client_read, mut client_write) = client.split();
        let (mut origin_read, mut origin_write) = origin.split();

        let client_to_origin = tokio::io::copy(&mut client_read, &mut origin_write);
        let origin_to_client = tokio::io::copy(&mut origin_read, &mut client_write);

        tokio::select! {
            _ = client_to_origin => {}
            _ = origin_to_client => {}
        }
    }

    let _ = client.shutdown().await;
    let _ = origin.shutdown().await;

    Ok(())
}
