//! Trawl: a multi-threaded batch URL fetcher and redirection resolver
//!
//! This crate takes a stream of URL-bearing items and runs them through a
//! fixed pool of worker threads while honoring a per-domain throttle and a
//! per-domain parallelism cap. Two policies are provided: `fetch` (perform
//! one request and classify the response) and `resolve` (follow a bounded
//! chain of redirects, including `Refresh` headers and meta-refresh tags).

pub mod config;
pub mod engine;
pub mod output;
pub mod policy;
pub mod transport;
pub mod url;

use thiserror::Error;

use crate::config::Config;
use crate::engine::{Engine, Outcomes};
use crate::policy::fetch::{FetchPolicy, FetchedDocument};
use crate::policy::resolve::{RedirectStep, ResolvePolicy};
use crate::policy::Throttle;
use crate::transport::http::HttpTransport;
use std::sync::Arc;

/// Main error type for Trawl operations
///
/// These are setup-time failures (bad configuration, client construction,
/// I/O). Per-item failures never surface here; they travel inside each
/// [`engine::Outcome`] as a [`FetchError`].
#[derive(Debug, Error)]
pub enum TrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Per-item error, carried inside an [`engine::Outcome`]
///
/// Every admitted item yields exactly one outcome; when the outcome is an
/// error it is one of these kinds. The engine never aborts on a per-item
/// failure.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("item has no url")]
    MissingUrl,

    #[error("invalid url: {0}")]
    InvalidUrl(String),

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

    #[error("body decode error: {0}")]
    Decode(String),

    #[error("too many redirects (limit {limit})")]
    TooManyRedirects {
        limit: usize,
        stack: Vec<RedirectStep>,
    },

    #[error("redirect cycle at {url}")]
    RedirectCycle {
        url: String,
        stack: Vec<RedirectStep>,
    },

    #[error("bad redirect target: {0}")]
    BadRedirectTarget(String),

    #[error("callback panicked: {0}")]
    PolicyPanic(String),
}

impl FetchError {
    /// Returns the stable machine-readable kind of this error
    ///
    /// These strings are part of the output contract and appear verbatim in
    /// reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingUrl => "missing_url",
            Self::InvalidUrl(_) => "invalid_url",
            Self::Dns(_) => "dns",
            Self::Connect(_) => "connect",
            Self::Tls(_) => "tls",
            Self::Timeout => "timeout",
            Self::Read(_) => "read",
            Self::Decode(_) => "decode",
            Self::TooManyRedirects { .. } => "too_many_redirects",
            Self::RedirectCycle { .. } => "redirect_cycle",
            Self::BadRedirectTarget(_) => "bad_redirect_target",
            Self::PolicyPanic(_) => "policy_panic",
        }
    }

    /// Returns the partial redirect stack attached to this error, if any
    pub fn partial_stack(&self) -> Option<&[RedirectStep]> {
        match self {
            Self::TooManyRedirects { stack, .. } | Self::RedirectCycle { stack, .. } => Some(stack),
            _ => None,
        }
    }
}

impl From<transport::TransportError> for FetchError {
    fn from(err: transport::TransportError) -> Self {
        use transport::TransportError;
        match err {
            TransportError::Dns(m) => Self::Dns(m),
            TransportError::Connect(m) => Self::Connect(m),
            TransportError::Tls(m) => Self::Tls(m),
            TransportError::Timeout => Self::Timeout,
            TransportError::Read(m) => Self::Read(m),
            TransportError::Decode(m) => Self::Decode(m),
        }
    }
}

/// Result type alias for Trawl operations
pub type Result<T> = std::result::Result<T, TrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use engine::{EngineOptions, Outcome};
pub use policy::DocumentMeta;
pub use url::domain_key;

/// Fetches a batch of URLs, yielding one outcome per input URL
///
/// Builds the HTTP transport and engine from `config` and starts the worker
/// pool immediately. The returned iterator yields outcomes in completion
/// order; dropping it cancels the run.
///
/// # Arguments
///
/// * `urls` - The input URLs; the sequence may be lazy and arbitrarily long
/// * `config` - Engine, HTTP and metadata settings
///
/// # Example
///
/// ```no_run
/// use trawl::config::Config;
///
/// let config = Config::default();
/// let outcomes = trawl::fetch_urls(vec!["https://example.com".to_string()], &config).unwrap();
/// for outcome in outcomes {
///     println!("{}: {:?}", outcome.url, outcome.result.is_ok());
/// }
/// ```
pub fn fetch_urls<I>(urls: I, config: &Config) -> Result<Outcomes<String, FetchedDocument>>
where
    I: IntoIterator<Item = String>,
    I::IntoIter: Send + 'static,
{
    let transport = Arc::new(HttpTransport::new(&config.http_options())?);
    let policy = FetchPolicy::new(transport, config.fetch_options());
    let engine = Engine::new(policy, config.engine_options())
        .with_throttle(Throttle::Constant(config.engine.throttle()));
    engine.run(urls)
}

/// Resolves the redirect chain of a batch of URLs
///
/// Same engine semantics as [`fetch_urls`]; each successful outcome carries
/// the ordered redirect stack ending in a terminal `hit` step.
pub fn resolve_urls<I>(urls: I, config: &Config) -> Result<Outcomes<String, Vec<RedirectStep>>>
where
    I: IntoIterator<Item = String>,
    I::IntoIter: Send + 'static,
{
    let transport = Arc::new(HttpTransport::new(&config.http_options())?);
    let policy = ResolvePolicy::new(transport, config.resolve_options());
    let engine = Engine::new(policy, config.engine_options())
        .with_throttle(Throttle::Constant(config.engine.throttle()));
    engine.run(urls)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_stable() {
        assert_eq!(FetchError::MissingUrl.kind(), "missing_url");
        assert_eq!(FetchError::InvalidUrl("x".into()).kind(), "invalid_url");
        assert_eq!(FetchError::Dns("x".into()).kind(), "dns");
        assert_eq!(FetchError::Connect("x".into()).kind(), "connect");
        assert_eq!(FetchError::Tls("x".into()).kind(), "tls");
        assert_eq!(FetchError::Timeout.kind(), "timeout");
        assert_eq!(FetchError::Read("x".into()).kind(), "read");
        assert_eq!(FetchError::Decode("x".into()).kind(), "decode");
        assert_eq!(
            FetchError::TooManyRedirects {
                limit: 5,
                stack: vec![]
            }
            .kind(),
            "too_many_redirects"
        );
        assert_eq!(
            FetchError::RedirectCycle {
                url: "x".into(),
                stack: vec![]
            }
            .kind(),
            "redirect_cycle"
        );
        assert_eq!(
            FetchError::BadRedirectTarget("x".into()).kind(),
            "bad_redirect_target"
        );
        assert_eq!(FetchError::PolicyPanic("x".into()).kind(), "policy_panic");
    }

    #[test]
    fn test_partial_stack_only_on_redirect_errors() {
        assert!(FetchError::Timeout.partial_stack().is_none());
        let err = FetchError::TooManyRedirects {
            limit: 5,
            stack: vec![],
        };
        assert!(err.partial_stack().is_some());
    }

    #[test]
    fn test_transport_error_conversion() {
        let err: FetchError = transport::TransportError::Timeout.into();
        assert_eq!(err.kind(), "timeout");
        let err: FetchError = transport::TransportError::Dns("no host".into()).into();
        assert_eq!(err.kind(), "dns");
    }
}
