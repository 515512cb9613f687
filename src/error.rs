//! Error types for the proxy core
//!
//! Every failure here is connection-local: the accept loop logs it and
//! keeps serving other connections.

use thiserror::Error;

/// Failures a single proxied connection can hit
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Malformed request line (missing target token)
    #[error("Malformed request line: {0:?}")]
    Parse(String),

    /// Outbound connect or send to an origin server failed
    #[error("Connection to {target} failed")]
    Connection {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error on an established socket
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProxyError {
    /// Build a `Connection` error for a `host:port` pair
    pub fn connection(host: &str, port: u16, source: std::io::Error) -> Self {
        ProxyError::Connection {
            target: format!("{}:{}", host, port),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_names_target() {
        let err = ProxyError::connection(
            "example.com",
            80,
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        );
        assert_eq!(err.to_string(), "Connection to example.com:80 failed");
    }

    #[test]
    fn test_parse_error_shows_line() {
        let err = ProxyError::Parse("GET".to_string());
        assert!(err.to_string().contains("GET"));
    }
}
