//! Transport seam: the only capability the engine requires of the network
//!
//! The engine performs one blocking call per job: hand over a request, get
//! back a status, headers and a body reader, or a tagged transport error.
//! Everything else (connection pooling, TLS, compression) is the transport
//! implementation's business. The production implementation lives in
//! [`http`]; tests substitute deterministic stubs.

pub mod http;

use std::io::Read;
use std::time::Duration;
use thiserror::Error;

/// HTTP method used by the engine
///
/// The policies only ever issue `HEAD` and `GET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
        }
    }
}

/// A single request handed to the transport
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: String,
    pub method: Method,

    /// Extra headers, appended to whatever the transport sets by default
    pub headers: Vec<(String, String)>,

    /// Per-request timeout override; `None` uses the transport default
    pub timeout: Option<Duration>,
}

impl TransportRequest {
    pub fn new(url: impl Into<String>, method: Method) -> Self {
        Self {
            url: url.into(),
            method,
            headers: Vec::new(),
            timeout: None,
        }
    }
}

/// The transport's reply: status, headers and a streaming body
///
/// The body is a lazy reader so that policies can choose between a full read
/// (fetch) and a bounded prefix read (meta-refresh scanning).
pub struct TransportReply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Box<dyn Read + Send>,
}

impl TransportReply {
    /// Looks up a header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Reads the entire body
    pub fn read_body(mut self) -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.body.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Reads at most `limit` bytes of the body
    pub fn read_body_prefix(mut self, limit: usize) -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(limit.min(8192));
        self.body
            .by_ref()
            .take(limit as u64)
            .read_to_end(&mut buf)?;
        Ok(buf)
    }
}

impl std::fmt::Debug for TransportReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportReply")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Tagged transport failure
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("dns lookup failed: {0}")]
    Dns(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("tls error: {0}")]
    Tls(String),

    #[error("request timed out")]
    Timeout,

    #[error("read error: {0}")]
    Read(String),

    #[error("decode error: {0}")]
    Decode(String),
}

/// Blocking transport interface
///
/// Implementations must be shareable across the worker pool; internal
/// synchronization (connection reuse) is their concern.
pub trait Transport: Send + Sync {
    fn perform(
        &self,
        request: &TransportRequest,
    ) -> std::result::Result<TransportReply, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reply_with(headers: Vec<(String, String)>, body: &str) -> TransportReply {
        TransportReply {
            status: 200,
            headers,
            body: Box::new(Cursor::new(body.as_bytes().to_vec())),
        }
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let reply = reply_with(
            vec![("Content-Type".to_string(), "text/html".to_string())],
            "",
        );
        assert_eq!(reply.header("content-type"), Some("text/html"));
        assert_eq!(reply.header("CONTENT-TYPE"), Some("text/html"));
        assert_eq!(reply.header("location"), None);
    }

    #[test]
    fn test_read_body() {
        let reply = reply_with(vec![], "hello world");
        assert_eq!(reply.read_body().unwrap(), b"hello world");
    }

    #[test]
    fn test_read_body_prefix_bounds_the_read() {
        let reply = reply_with(vec![], "hello world");
        assert_eq!(reply.read_body_prefix(5).unwrap(), b"hello");
    }

    #[test]
    fn test_read_body_prefix_on_short_body() {
        let reply = reply_with(vec![], "hi");
        assert_eq!(reply.read_body_prefix(4096).unwrap(), b"hi");
    }

    #[test]
    fn test_method_as_str() {
        assert_eq!(Method::Get.as_str(), "GET");
        assert_eq!(Method::Head.as_str(), "HEAD");
    }
}
