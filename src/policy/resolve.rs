//! Resolve policy: walk a bounded redirect chain to its final target
//!
//! Standard `Location` redirects are always followed. Two softer redirect
//! mechanisms are opt-in: the nonstandard `Refresh` header, and the
//! `<meta http-equiv="refresh">` tag scanned from a bounded body prefix.

use crate::engine::Item;
use crate::policy::Policy;
use crate::transport::{Method, Transport, TransportReply, TransportRequest};
use crate::FetchError;
use scraper::{Html, Selector};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// How many body bytes the meta-refresh scanner reads
const META_REFRESH_SCAN_BYTES: usize = 4096;

/// How a redirect hop was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RedirectKind {
    /// 3xx status with a Location header
    Location,
    /// Nonstandard `Refresh: N; url=...` header
    RefreshHeader,
    /// `<meta http-equiv="refresh">` tag in the body
    MetaRefresh,
    /// Terminal entry: the chain ended here
    Hit,
}

impl RedirectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::RefreshHeader => "refresh-header",
            Self::MetaRefresh => "meta-refresh",
            Self::Hit => "hit",
        }
    }
}

impl fmt::Display for RedirectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One hop of a redirect chain
///
/// `status` is the status of the response received at `from`. The terminal
/// entry has `from == to` and kind [`RedirectKind::Hit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectStep {
    pub from: String,
    pub to: String,
    pub status: u16,
    pub kind: RedirectKind,
}

/// Resolve behavior toggles
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Maximum redirect hops before giving up
    pub max_redirects: usize,

    /// Honor `Refresh: N; url=...` headers
    pub follow_refresh_header: bool,

    /// Scan body prefixes for meta-refresh tags (forces GET requests)
    pub follow_meta_refresh: bool,

    /// Per-request timeout override; `None` uses the transport default
    pub timeout: Option<Duration>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            max_redirects: 5,
            follow_refresh_header: true,
            follow_meta_refresh: false,
            timeout: None,
        }
    }
}

/// Resolves each item's URL to the end of its redirect chain
pub struct ResolvePolicy {
    transport: Arc<dyn Transport>,
    options: ResolveOptions,
}

impl ResolvePolicy {
    pub fn new(transport: Arc<dyn Transport>, options: ResolveOptions) -> Self {
        Self { transport, options }
    }

    /// Issues one probe request
    ///
    /// HEAD by default, with a GET retry when the server rejects the method.
    /// When meta-refresh scanning is on, GET from the start: a HEAD reply
    /// has no body to scan.
    fn probe(&self, url: &str) -> Result<TransportReply, FetchError> {
        let method = if self.options.follow_meta_refresh {
            Method::Get
        } else {
            Method::Head
        };

        let mut request = TransportRequest::new(url, method);
        request.timeout = self.options.timeout;
        let reply = self.transport.perform(&request)?;

        if method == Method::Head && matches!(reply.status, 405 | 501) {
            let mut retry = TransportRequest::new(url, Method::Get);
            retry.timeout = self.options.timeout;
            return Ok(self.transport.perform(&retry)?);
        }
        Ok(reply)
    }

    /// Extracts the next hop from a reply, if it redirects at all
    fn find_redirect(
        &self,
        reply: TransportReply,
    ) -> Result<Option<(String, RedirectKind)>, FetchError> {
        let status = reply.status;

        if (300..400).contains(&status) {
            if let Some(location) = reply.header("location") {
                return Ok(Some((location.to_string(), RedirectKind::Location)));
            }
        }

        if self.options.follow_refresh_header {
            if let Some(value) = reply.header("refresh") {
                if let Some(target) = parse_refresh(value) {
                    return Ok(Some((target, RedirectKind::RefreshHeader)));
                }
            }
        }

        if self.options.follow_meta_refresh && status < 300 && html_worth_scanning(&reply) {
            let prefix = reply
                .read_body_prefix(META_REFRESH_SCAN_BYTES)
                .map_err(|err| FetchError::Read(err.to_string()))?;
            if let Some(target) = scan_meta_refresh(&prefix) {
                return Ok(Some((target, RedirectKind::MetaRefresh)));
            }
        }

        Ok(None)
    }
}

impl<T> Policy<T> for ResolvePolicy {
    type Output = Vec<RedirectStep>;

    fn run(&self, item: &Item<T>) -> Result<Vec<RedirectStep>, FetchError> {
        if item.url.is_empty() {
            return Err(FetchError::MissingUrl);
        }

        let mut current = Url::parse(&item.url)
            .map_err(|err| FetchError::InvalidUrl(format!("{}: {err}", item.url)))?;
        let mut stack: Vec<RedirectStep> = Vec::new();

        loop {
            let reply = self.probe(current.as_str())?;
            let status = reply.status;

            let Some((target, kind)) = self.find_redirect(reply)? else {
                stack.push(RedirectStep {
                    from: current.to_string(),
                    to: current.to_string(),
                    status,
                    kind: RedirectKind::Hit,
                });
                tracing::debug!(url = %item.url, hops = stack.len() - 1, "chain resolved");
                return Ok(stack);
            };

            if stack.len() >= self.options.max_redirects {
                return Err(FetchError::TooManyRedirects {
                    limit: self.options.max_redirects,
                    stack,
                });
            }

            let next = current
                .join(&target)
                .map_err(|err| FetchError::BadRedirectTarget(format!("{target}: {err}")))?;

            let already_seen = stack.iter().any(|step| step.to == next.as_str());
            stack.push(RedirectStep {
                from: current.to_string(),
                to: next.to_string(),
                status,
                kind,
            });
            if already_seen {
                return Err(FetchError::RedirectCycle {
                    url: next.to_string(),
                    stack,
                });
            }

            tracing::trace!(from = %current, to = %next, status, "following redirect");
            current = next;
        }
    }
}

/// Parses a Refresh value of the form `N; url=...`
///
/// Quotes around the target and case variations of `url=` are tolerated;
/// values without a target yield `None`.
fn parse_refresh(value: &str) -> Option<String> {
    let (delay, rest) = value.split_once(';')?;
    delay.trim().parse::<f64>().ok()?;

    let rest = rest.trim();
    if !rest.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("url=")) {
        return None;
    }

    let target = rest[4..].trim().trim_matches(|c| c == '"' || c == '\'');
    if target.is_empty() {
        None
    } else {
        Some(target.to_string())
    }
}

/// Whether a reply's body is worth scanning for a meta-refresh tag
fn html_worth_scanning(reply: &TransportReply) -> bool {
    match reply.header("content-type") {
        Some(value) => value.to_lowercase().contains("html"),
        None => true,
    }
}

/// Scans an HTML prefix for `<meta http-equiv="refresh" content="N; url=...">`
fn scan_meta_refresh(prefix: &[u8]) -> Option<String> {
    let html = String::from_utf8_lossy(prefix);
    let document = Html::parse_document(&html);
    let selector = Selector::parse("meta").ok()?;

    for element in document.select(&selector) {
        let http_equiv = match element.value().attr("http-equiv") {
            Some(value) => value,
            None => continue,
        };
        if !http_equiv.eq_ignore_ascii_case("refresh") {
            continue;
        }
        if let Some(content) = element.value().attr("content") {
            if let Some(target) = parse_refresh(content) {
                return Some(target);
            }
        }
    }
    None
}
