use crate::engine::EngineOptions;
use crate::policy::fetch::FetchOptions;
use crate::policy::resolve::ResolveOptions;
use crate::transport::http::{default_user_agent, HttpOptions};
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Trawl
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub http: HttpConfig,
    pub fetch: FetchConfig,
    pub resolve: ResolveConfig,
}

/// Scheduling and worker-pool configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of worker threads
    pub threads: usize,

    /// Minimum pause between completions and next dispatches on the same
    /// domain (milliseconds)
    #[serde(rename = "throttle-ms")]
    pub throttle_ms: u64,

    /// Maximum simultaneous requests per domain
    #[serde(rename = "domain-parallelism")]
    pub domain_parallelism: usize,

    /// Maximum items staged ahead of dispatch
    #[serde(rename = "buffer-size")]
    pub buffer_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: 25,
            throttle_ms: 200,
            domain_parallelism: 1,
            buffer_size: 25,
        }
    }
}

impl EngineConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// User-Agent header; defaults to `trawl/<version>`
    #[serde(rename = "user-agent")]
    pub user_agent: Option<String>,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: f64,

    /// Connection establishment timeout (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: f64,

    /// Disable TLS certificate verification
    pub insecure: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout_secs: 30.0,
            connect_timeout_secs: 10.0,
            insecure: false,
        }
    }
}

/// Fetch policy configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Derive a canonical file extension for each document
    #[serde(rename = "guess-extension")]
    pub guess_extension: bool,

    /// Derive the text encoding for each document
    #[serde(rename = "guess-encoding")]
    pub guess_encoding: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            guess_extension: true,
            guess_encoding: true,
        }
    }
}

/// Resolve policy configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Maximum redirect hops before giving up
    #[serde(rename = "max-redirects")]
    pub max_redirects: usize,

    /// Honor `Refresh: N; url=...` headers
    #[serde(rename = "follow-refresh-header")]
    pub follow_refresh_header: bool,

    /// Scan body prefixes for meta-refresh tags
    #[serde(rename = "follow-meta-refresh")]
    pub follow_meta_refresh: bool,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            max_redirects: 5,
            follow_refresh_header: true,
            follow_meta_refresh: false,
        }
    }
}

impl Config {
    /// Engine options derived from this configuration
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            threads: self.engine.threads,
            domain_parallelism: self.engine.domain_parallelism,
            buffer_size: self.engine.buffer_size,
        }
    }

    /// HTTP transport options derived from this configuration
    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            user_agent: self
                .http
                .user_agent
                .clone()
                .unwrap_or_else(default_user_agent),
            timeout: Duration::from_secs_f64(self.http.timeout_secs),
            connect_timeout: Duration::from_secs_f64(self.http.connect_timeout_secs),
            insecure: self.http.insecure,
        }
    }

    /// Fetch policy options derived from this configuration
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: None,
            guess_extension: self.fetch.guess_extension,
            guess_encoding: self.fetch.guess_encoding,
        }
    }

    /// Resolve policy options derived from this configuration
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            max_redirects: self.resolve.max_redirects,
            follow_refresh_header: self.resolve.follow_refresh_header,
            follow_meta_refresh: self.resolve.follow_meta_refresh,
            timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.engine.threads, 25);
        assert_eq!(config.engine.throttle_ms, 200);
        assert_eq!(config.engine.domain_parallelism, 1);
        assert_eq!(config.engine.buffer_size, 25);
        assert!(!config.http.insecure);
        assert!(config.fetch.guess_extension);
        assert_eq!(config.resolve.max_redirects, 5);
        assert!(config.resolve.follow_refresh_header);
        assert!(!config.resolve.follow_meta_refresh);
    }

    #[test]
    fn test_throttle_conversion() {
        let config = EngineConfig {
            throttle_ms: 150,
            ..EngineConfig::default()
        };
        assert_eq!(config.throttle(), Duration::from_millis(150));
    }

    #[test]
    fn test_http_options_fill_in_default_user_agent() {
        let config = Config::default();
        assert!(config.http_options().user_agent.starts_with("trawl/"));

        let mut config = Config::default();
        config.http.user_agent = Some("custom-bot/2".to_string());
        assert_eq!(config.http_options().user_agent, "custom-bot/2");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
[engine]
threads = 4
"#,
        )
        .unwrap();
        assert_eq!(config.engine.threads, 4);
        assert_eq!(config.engine.throttle_ms, 200);
        assert_eq!(config.resolve.max_redirects, 5);
    }

    #[test]
    fn test_kebab_case_keys() {
        let config: Config = toml::from_str(
            r#"
[engine]
throttle-ms = 50
domain-parallelism = 3
buffer-size = 10

[http]
timeout-secs = 5.0
insecure = true

[resolve]
max-redirects = 8
follow-meta-refresh = true
"#,
        )
        .unwrap();
        assert_eq!(config.engine.throttle_ms, 50);
        assert_eq!(config.engine.domain_parallelism, 3);
        assert_eq!(config.engine.buffer_size, 10);
        assert!(config.http.insecure);
        assert_eq!(config.resolve.max_redirects, 8);
        assert!(config.resolve.follow_meta_refresh);
    }
}
