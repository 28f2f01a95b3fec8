use url::Url;

/// Extracts the canonical domain key from a raw URL string
///
/// The key is the lowercase host with a leading `www.` label removed. It is
/// the grouping key for the scheduler, not a display value. Items whose URL
/// cannot be parsed, or that have no host, get the empty-string key and are
/// dispatched through the unconstrained path.
///
/// This function is called under the scheduler lock and must stay cheap and
/// allocation-light.
///
/// # Examples
///
/// ```
/// use trawl::url::domain_key;
///
/// assert_eq!(domain_key("https://www.lemonde.fr/page"), "lemonde.fr");
/// assert_eq!(domain_key("https://EXAMPLE.COM/"), "example.com");
/// assert_eq!(domain_key("not a url"), "");
/// ```
pub fn domain_key(raw: &str) -> String {
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(_) => return String::new(),
    };

    let host = match url.host_str() {
        Some(host) => host.to_lowercase(),
        None => return String::new(),
    };

    match host.strip_prefix("www.") {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_domain() {
        assert_eq!(domain_key("https://example.com/"), "example.com");
    }

    #[test]
    fn test_strips_www_prefix() {
        assert_eq!(domain_key("https://www.example.com/page"), "example.com");
    }

    #[test]
    fn test_keeps_other_subdomains() {
        assert_eq!(domain_key("https://blog.example.com/"), "blog.example.com");
    }

    #[test]
    fn test_lowercases_host() {
        assert_eq!(domain_key("https://WWW.LeMonde.FR/"), "lemonde.fr");
    }

    #[test]
    fn test_ignores_port_path_query_fragment() {
        assert_eq!(
            domain_key("https://example.com:8080/a/b?q=1#frag"),
            "example.com"
        );
    }

    #[test]
    fn test_unparseable_url_yields_sentinel() {
        assert_eq!(domain_key("not a url"), "");
        assert_eq!(domain_key(""), "");
    }

    #[test]
    fn test_url_without_host_yields_sentinel() {
        assert_eq!(domain_key("mailto:someone@example.com"), "");
        assert_eq!(domain_key("data:text/plain,hello"), "");
    }

    #[test]
    fn test_ip_host() {
        assert_eq!(domain_key("http://127.0.0.1:8000/x"), "127.0.0.1");
    }
}
