//! HTTP message parsing helpers
//!
//! Pure functions over raw request/response buffers already received off
//! the wire. No I/O happens here; the connection handler and cache feed
//! these whatever a single receive produced.

use chrono::Utc;

use crate::error::ProxyError;

/// Extract the request-line target (second token of the first line).
///
/// The target string is used verbatim as the cache and block-list key.
pub fn extract_target(request: &str) -> Result<String, ProxyError> {
    let request_line = request.split("\r\n").next().unwrap_or("");
    let mut tokens = request_line.split_whitespace();
    let _method = tokens.next();

    tokens
        .next()
        .map(|t| t.to_string())
        .ok_or_else(|| ProxyError::Parse(request_line.to_string()))
}

/// Extract the request method (first token of the first line).
pub fn extract_method(request: &str) -> &str {
    request
        .split("\r\n")
        .next()
        .and_then(|line| line.split_whitespace().next())
        .unwrap_or("")
}

/// Extract the `Host` header value with any `:port` suffix stripped.
///
/// Falls back to `"localhost"` when the header is absent; this never fails.
pub fn extract_host(request: &str) -> String {
    for line in request.split("\r\n") {
        if line.to_lowercase().starts_with("host:") {
            let value = line.splitn(2, ':').nth(1).unwrap_or("").trim();
            let host = value.split(':').next().unwrap_or(value).trim();
            return host.to_string();
        }
    }
    "localhost".to_string()
}

/// Extract the status code (second token of the status line).
///
/// Returns an empty slice for an empty response.
pub fn extract_status_code(response: &[u8]) -> &[u8] {
    let status_line = match response.windows(2).position(|w| w == b"\r\n") {
        Some(end) => &response[..end],
        None => response,
    };

    status_line
        .split(|b| b.is_ascii_whitespace())
        .filter(|token| !token.is_empty())
        .nth(1)
        .unwrap_or_default()
}

/// Extract the `Last-Modified` header value from a response.
///
/// A response without one is treated as modified "now": the current time is
/// returned as an HTTP-date. That trades away future revalidation savings
/// for that entry rather than storing an undefined marker.
pub fn extract_last_modified(response: &[u8]) -> Vec<u8> {
    for line in response.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.len() >= 14 && line[..14].eq_ignore_ascii_case(b"last-modified:") {
            return line[14..].trim_ascii().to_vec();
        }
    }

    Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
        .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_target() {
        let request = "GET /index.html HTTP/1.1\r\nHost: example.com\r\n\r\n";
        assert_eq!(extract_target(request).unwrap(), "/index.html");

        let absolute = "GET http://example.com/ HTTP/1.1\r\n\r\n";
        assert_eq!(extract_target(absolute).unwrap(), "http://example.com/");
    }

    #[test]
    fn test_extract_target_missing_token() {
        assert!(extract_target("GET\r\n\r\n").is_err());
        assert!(extract_target("").is_err());
    }

    #[test]
    fn test_extract_method() {
        let request = "CONNECT example.com:443 HTTP/1.1\r\n\r\n";
        assert_eq!(extract_method(request), "CONNECT");
        assert_eq!(extract_method(""), "");
    }

    #[test]
    fn test_extract_host_strips_port() {
        let request = "GET / HTTP/1.1\r\nHost: example.com:8080\r\n\r\n";
        assert_eq!(extract_host(request), "example.com");
    }

    #[test]
    fn test_extract_host_case_insensitive() {
        let request = "GET / HTTP/1.1\r\nhOsT: Example.org\r\n\r\n";
        assert_eq!(extract_host(request), "Example.org");
    }

    #[test]
    fn test_extract_host_fallback() {
        let request = "GET / HTTP/1.1\r\nAccept: */*\r\n\r\n";
        assert_eq!(extract_host(request), "localhost");
    }

    #[test]
    fn test_extract_status_code() {
        let response = b"HTTP/1.1 304 Not Modified\r\nDate: x\r\n\r\n";
        assert_eq!(extract_status_code(response), b"304");

        let ok = b"HTTP/1.1 200 OK\r\n\r\nbody";
        assert_eq!(extract_status_code(ok), b"200");
    }

    #[test]
    fn test_extract_status_code_empty() {
        assert_eq!(extract_status_code(b""), b"");
    }

    #[test]
    fn test_extract_last_modified_present() {
        let response =
            b"HTTP/1.1 200 OK\r\nLast-Modified: Mon, 01 Jan 2024 00:00:00 GMT\r\n\r\nbody";
        assert_eq!(
            extract_last_modified(response),
            b"Mon, 01 Jan 2024 00:00:00 GMT"
        );
    }

    #[test]
    fn test_extract_last_modified_case_insensitive() {
        let response = b"HTTP/1.1 200 OK\r\nlast-modified: Tue, 02 Jan 2024 00:00:00 GMT\r\n\r\n";
        assert_eq!(
            extract_last_modified(response),
            b"Tue, 02 Jan 2024 00:00:00 GMT"
        );
    }

    #[test]
    fn test_extract_last_modified_defaults_to_now() {
        let value = extract_last_modified(b"HTTP/1.1 200 OK\r\n\r\n");
        let text = String::from_utf8(value).unwrap();
        // "Mon, 01 Jan 2024 00:00:00 GMT" shape
        assert!(text.ends_with(" GMT"));
        assert_eq!(text.len(), 29);
    }
}
