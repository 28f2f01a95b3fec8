//! Fetch policy: one request per item, response plus derived metadata

use crate::engine::Item;
use crate::policy::meta::{document_meta, DocumentMeta};
use crate::policy::{Policy, RequestArgsFn, RequestOverrides};
use crate::transport::{Method, Transport, TransportRequest};
use crate::FetchError;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Fetch behavior toggles
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Per-request timeout override; `None` uses the transport default
    pub timeout: Option<Duration>,

    /// Derive a canonical file extension for each document
    pub guess_extension: bool,

    /// Derive the text encoding for each document
    pub guess_encoding: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            guess_extension: true,
            guess_encoding: true,
        }
    }
}

/// The raw response for one fetched item
#[derive(Debug, Clone)]
pub struct ResponseRecord {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ResponseRecord {
    /// Looks up a header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A successful fetch outcome: the response and its derived metadata
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub response: ResponseRecord,
    pub meta: DocumentMeta,
}

/// Fetches each item's URL with a single GET and classifies the result
///
/// Items without a URL short-circuit to `missing_url` without touching the
/// network; redirects are reported as-is (3xx status, no following).
pub struct FetchPolicy<T = String> {
    transport: Arc<dyn Transport>,
    options: FetchOptions,
    request_args: Option<RequestArgsFn<T>>,
}

impl<T> FetchPolicy<T> {
    pub fn new(transport: Arc<dyn Transport>, options: FetchOptions) -> Self {
        Self {
            transport,
            options,
            request_args: None,
        }
    }

    /// Installs a per-item request-override callback
    ///
    /// The callback runs on the worker, inside the panic sandbox; a panic
    /// costs only the offending item.
    pub fn with_request_args<F>(mut self, f: F) -> Self
    where
        F: Fn(&Item<T>) -> RequestOverrides + Send + Sync + 'static,
    {
        self.request_args = Some(Arc::new(f));
        self
    }
}

impl<T> Policy<T> for FetchPolicy<T> {
    type Output = FetchedDocument;

    fn run(&self, item: &Item<T>) -> Result<FetchedDocument, FetchError> {
        if item.url.is_empty() {
            return Err(FetchError::MissingUrl);
        }

        let parsed = Url::parse(&item.url)
            .map_err(|err| FetchError::InvalidUrl(format!("{}: {err}", item.url)))?;

        let overrides = match &self.request_args {
            Some(f) => f(item),
            None => RequestOverrides::default(),
        };

        let mut request = TransportRequest::new(item.url.clone(), Method::Get);
        request.headers = overrides.headers;
        request.timeout = overrides.timeout.or(self.options.timeout);

        let reply = self.transport.perform(&request)?;

        let status = reply.status;
        let headers = reply.headers.clone();
        let content_type = reply.header("content-type").map(|v| v.to_string());

        let body = reply
            .read_body()
            .map_err(|err| FetchError::Read(err.to_string()))?;

        tracing::debug!(url = %item.url, status, bytes = body.len(), "fetched");

        let meta = document_meta(
            &parsed,
            content_type.as_deref(),
            &body,
            self.options.guess_extension,
            self.options.guess_encoding,
        );

        Ok(FetchedDocument {
            response: ResponseRecord {
                url: item.url.clone(),
                status,
                headers,
                body,
            },
            meta,
        })
    }
}
