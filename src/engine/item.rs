//! The unit of work flowing through the engine

use crate::engine::panic_message;
use crate::url::domain_key;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Caller-provided key extractor: payload in, URL out
///
/// `None` marks the item as URL-less; it is dispatched immediately through
/// the unconstrained path and produces a `missing_url` outcome.
pub type KeyFn<T> = Arc<dyn Fn(&T) -> Option<String> + Send + Sync>;

/// One unit of work
///
/// The domain key is extracted once, at admission time, and cached here; it
/// governs every scheduling decision for the item. The empty string is the
/// no-domain sentinel.
pub struct Item<T> {
    pub payload: T,
    pub url: String,
    pub domain: String,

    /// Panic message from the key extractor, if it blew up on this payload.
    /// A tainted item skips the policy and yields a `policy_panic` outcome.
    pub(crate) tainted: Option<String>,
}

impl<T> Item<T> {
    /// Builds an item from a payload, running the key extractor under panic
    /// isolation
    ///
    /// A panicking extractor taints this item only; the input stream keeps
    /// flowing.
    pub(crate) fn from_payload(payload: T, key: &KeyFn<T>) -> Self {
        match catch_unwind(AssertUnwindSafe(|| key(&payload))) {
            Ok(Some(url)) => {
                let domain = domain_key(&url);
                Self {
                    payload,
                    url,
                    domain,
                    tainted: None,
                }
            }
            Ok(None) => Self {
                payload,
                url: String::new(),
                domain: String::new(),
                tainted: None,
            },
            Err(panic) => Self {
                payload,
                url: String::new(),
                domain: String::new(),
                tainted: Some(panic_message(panic)),
            },
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Item<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Item")
            .field("url", &self.url)
            .field("domain", &self.domain)
            .field("payload", &self.payload)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_key() -> KeyFn<String> {
        Arc::new(|value: &String| Some(value.clone()))
    }

    #[test]
    fn test_item_caches_url_and_domain() {
        let item = Item::from_payload("https://www.example.com/a".to_string(), &identity_key());
        assert_eq!(item.url, "https://www.example.com/a");
        assert_eq!(item.domain, "example.com");
        assert!(item.tainted.is_none());
    }

    #[test]
    fn test_item_without_url_gets_sentinel_domain() {
        let key: KeyFn<String> = Arc::new(|_| None);
        let item = Item::from_payload("whatever".to_string(), &key);
        assert_eq!(item.url, "");
        assert_eq!(item.domain, "");
        assert!(item.tainted.is_none());
    }

    #[test]
    fn test_unparseable_url_gets_sentinel_domain() {
        let item = Item::from_payload("not a url".to_string(), &identity_key());
        assert_eq!(item.url, "not a url");
        assert_eq!(item.domain, "");
    }

    #[test]
    fn test_panicking_extractor_taints_item() {
        let key: KeyFn<String> = Arc::new(|_| panic!("key exploded"));
        let item = Item::from_payload("x".to_string(), &key);
        assert_eq!(item.domain, "");
        assert_eq!(item.tainted.as_deref(), Some("key exploded"));
    }
}
