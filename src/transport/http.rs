//! Production transport backed by `reqwest`'s blocking client
//!
//! Redirects are never followed automatically; the resolve policy walks
//! chains by hand and the fetch policy reports 3xx statuses as-is.

use super::{Method, Transport, TransportError, TransportReply, TransportRequest};
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use std::time::Duration;

/// Settings used to build the HTTP client
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Default per-request timeout
    pub timeout: Duration,

    /// Connection establishment timeout
    pub connect_timeout: Duration,

    /// Disable TLS certificate verification
    pub insecure: bool,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            insecure: false,
        }
    }
}

/// Returns the compiled-in User-Agent string
pub fn default_user_agent() -> String {
    format!("trawl/{}", env!("CARGO_PKG_VERSION"))
}

/// Blocking HTTP transport with an internal connection pool
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Builds the transport
    ///
    /// # Arguments
    ///
    /// * `options` - User agent, timeouts and TLS verification settings
    ///
    /// # Returns
    ///
    /// * `Ok(HttpTransport)` - Ready to perform requests
    /// * `Err(reqwest::Error)` - Client construction failed
    pub fn new(options: &HttpOptions) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(options.user_agent.clone())
            .timeout(options.timeout)
            .connect_timeout(options.connect_timeout)
            .redirect(Policy::none())
            .danger_accept_invalid_certs(options.insecure)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn perform(&self, request: &TransportRequest) -> Result<TransportReply, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Head => self.client.head(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().map_err(classify_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        Ok(TransportReply {
            status,
            headers,
            body: Box::new(response),
        })
    }
}

/// Maps a reqwest error onto the tagged transport kinds
///
/// reqwest does not expose DNS and TLS failures as dedicated predicates, so
/// those two are recognized from the error's source chain text.
fn classify_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout;
    }

    let text = error_chain_text(&err);
    let lowered = text.to_lowercase();

    if lowered.contains("dns") || lowered.contains("failed to lookup") {
        return TransportError::Dns(text);
    }

    if lowered.contains("certificate")
        || lowered.contains("tls")
        || lowered.contains("ssl")
        || lowered.contains("handshake")
    {
        return TransportError::Tls(text);
    }

    if err.is_connect() {
        return TransportError::Connect(text);
    }

    if err.is_decode() {
        return TransportError::Decode(text);
    }

    TransportError::Read(text)
}

/// Collects the full source chain of an error into one string
fn error_chain_text(err: &dyn std::error::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_transport_with_defaults() {
        let transport = HttpTransport::new(&HttpOptions::default());
        assert!(transport.is_ok());
    }

    #[test]
    fn test_build_transport_insecure() {
        let options = HttpOptions {
            insecure: true,
            ..HttpOptions::default()
        };
        assert!(HttpTransport::new(&options).is_ok());
    }

    #[test]
    fn test_default_user_agent_carries_version() {
        let ua = default_user_agent();
        assert!(ua.starts_with("trawl/"));
    }

    #[test]
    fn test_error_chain_text_joins_sources() {
        use std::fmt;

        #[derive(Debug)]
        struct Inner;
        impl fmt::Display for Inner {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "dns error")
            }
        }
        impl std::error::Error for Inner {}

        #[derive(Debug)]
        struct Outer(Inner);
        impl fmt::Display for Outer {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "request failed")
            }
        }
        impl std::error::Error for Outer {
            fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
                Some(&self.0)
            }
        }

        let text = error_chain_text(&Outer(Inner));
        assert_eq!(text, "request failed: dns error");
    }
}
