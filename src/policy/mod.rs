//! Per-job behavior: what a worker actually does with an item
//!
//! The engine is policy-agnostic; fetch and resolve are the two shipped
//! policies. Caller-tunable behavior (throttle, per-item request overrides)
//! lives here as small strategy values.

pub mod fetch;
mod meta;
pub mod resolve;

pub use meta::{document_meta, mime_from_content_type, DocumentMeta};

use crate::engine::Item;
use crate::FetchError;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// Default pause between completions and next dispatches on one domain
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(200);

/// The per-job behavior invoked by a worker
///
/// `run` executes outside every engine lock and may block on the network.
/// Panics are caught by the worker and become `policy_panic` outcomes, but
/// well-behaved policies return errors instead.
pub trait Policy<T>: Send + Sync {
    type Output: Send + 'static;

    fn run(&self, item: &Item<T>) -> Result<Self::Output, FetchError>;
}

/// Per-domain throttle: a constant pause or a caller-provided function
///
/// The dynamic variant is evaluated at each completion, on the completing
/// worker, with the domain and the completed item.
pub enum Throttle<T> {
    Constant(Duration),
    Dynamic(Arc<dyn Fn(&str, &Item<T>) -> Duration + Send + Sync>),
}

impl<T> Throttle<T> {
    /// Wraps a throttle function
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&str, &Item<T>) -> Duration + Send + Sync + 'static,
    {
        Self::Dynamic(Arc::new(f))
    }

    /// Resolves the throttle to a duration for one completion
    ///
    /// A panicking throttle function is reported back as its panic message;
    /// the caller applies a zero pause and taints the item's outcome.
    pub(crate) fn evaluate(&self, domain: &str, item: &Item<T>) -> Result<Duration, String> {
        match self {
            Self::Constant(duration) => Ok(*duration),
            Self::Dynamic(f) => catch_unwind(AssertUnwindSafe(|| f(domain, item)))
                .map_err(crate::engine::panic_message),
        }
    }
}

impl<T> Clone for Throttle<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Constant(duration) => Self::Constant(*duration),
            Self::Dynamic(f) => Self::Dynamic(Arc::clone(f)),
        }
    }
}

impl<T> Default for Throttle<T> {
    fn default() -> Self {
        Self::Constant(DEFAULT_THROTTLE)
    }
}

impl<T> fmt::Debug for Throttle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(duration) => f.debug_tuple("Constant").field(duration).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Per-item request adjustments computed by a caller callback
#[derive(Debug, Clone, Default)]
pub struct RequestOverrides {
    /// Extra headers for this request
    pub headers: Vec<(String, String)>,

    /// Per-item timeout override
    pub timeout: Option<Duration>,
}

/// Callback computing request overrides from an item
pub type RequestArgsFn<T> = Arc<dyn Fn(&Item<T>) -> RequestOverrides + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Item;

    fn make_item(url: &str) -> Item<String> {
        let key: crate::engine::KeyFn<String> = Arc::new(|value: &String| Some(value.clone()));
        Item::from_payload(url.to_string(), &key)
    }

    #[test]
    fn test_default_throttle_is_200ms() {
        let throttle: Throttle<String> = Throttle::default();
        let item = make_item("https://example.com/");
        assert_eq!(
            throttle.evaluate("example.com", &item).unwrap(),
            Duration::from_millis(200)
        );
    }

    #[test]
    fn test_dynamic_throttle_sees_domain_and_item() {
        let throttle: Throttle<String> = Throttle::dynamic(|domain, item| {
            assert_eq!(domain, "example.com");
            assert_eq!(item.url, "https://example.com/");
            Duration::from_millis(42)
        });
        let item = make_item("https://example.com/");
        assert_eq!(
            throttle.evaluate("example.com", &item).unwrap(),
            Duration::from_millis(42)
        );
    }

    #[test]
    fn test_panicking_throttle_yields_its_message() {
        let throttle: Throttle<String> = Throttle::dynamic(|_, _| panic!("throttle broke"));
        let item = make_item("https://example.com/");
        assert_eq!(
            throttle.evaluate("example.com", &item).unwrap_err(),
            "throttle broke"
        );
    }

    #[test]
    fn test_clone_shares_the_dynamic_fn() {
        let throttle: Throttle<String> = Throttle::dynamic(|_, _| Duration::from_millis(7));
        let cloned = throttle.clone();
        let item = make_item("https://example.com/");
        assert_eq!(
            cloned.evaluate("x", &item).unwrap(),
            Duration::from_millis(7)
        );
    }
}
