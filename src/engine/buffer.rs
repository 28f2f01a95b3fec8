//! Staging admission: the engine's sole backpressure point
//!
//! The buffer pulls from the caller's iterator just far enough to keep
//! workers busy across many domains. Admission is capped, with one
//! exception: an item for a domain the scheduler has never seen is admitted
//! even when the buffer is full, so that idle workers always discover new
//! domains in a sorted or clustered input. When the cap is hit and the next
//! item's domain is already known, the item is parked in a single
//! blocked-head slot and the input is not read again until a dispatch frees
//! space.

use crate::engine::item::{Item, KeyFn};

/// Outcome of one admission attempt
pub(crate) enum Pull<T> {
    /// Item admitted; the scheduler must account for it
    Admitted(Item<T>),
    /// Buffer full and the head item's domain is already known
    Blocked,
    /// Input iterator is done and the blocked-head slot is empty
    Exhausted,
}

pub(crate) struct DomainBuffer<T> {
    input: Box<dyn Iterator<Item = T> + Send>,
    key: KeyFn<T>,
    pending: Option<Item<T>>,
    exhausted: bool,
}

impl<T> DomainBuffer<T> {
    pub fn new(input: Box<dyn Iterator<Item = T> + Send>, key: KeyFn<T>) -> Self {
        Self {
            input,
            key,
            pending: None,
            exhausted: false,
        }
    }

    /// True once the input is drained and no blocked head remains
    pub fn is_drained(&self) -> bool {
        self.exhausted && self.pending.is_none()
    }

    /// Attempts to admit one item
    ///
    /// # Arguments
    ///
    /// * `buffered` - Items currently staged across all domain queues
    /// * `capacity` - The configured buffer size
    /// * `is_known` - Whether a domain already exists in the scheduler index
    pub fn pull<F>(&mut self, buffered: usize, capacity: usize, is_known: F) -> Pull<T>
    where
        F: Fn(&str) -> bool,
    {
        let item = match self.pending.take() {
            Some(item) => item,
            None => {
                if self.exhausted {
                    return Pull::Exhausted;
                }
                match self.input.next() {
                    Some(payload) => Item::from_payload(payload, &self.key),
                    None => {
                        self.exhausted = true;
                        return Pull::Exhausted;
                    }
                }
            }
        };

        // No-domain items are dispatched immediately and never pile up, so
        // they bypass the cap. Unknown domains bypass it too: that peek-ahead
        // is the buffer's whole reason to exist.
        if buffered < capacity || item.domain.is_empty() || !is_known(&item.domain) {
            return Pull::Admitted(item);
        }

        self.pending = Some(item);
        Pull::Blocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn buffer_over(urls: Vec<&str>) -> DomainBuffer<String> {
        let key: KeyFn<String> = Arc::new(|value: &String| Some(value.clone()));
        let owned: Vec<String> = urls.into_iter().map(String::from).collect();
        DomainBuffer::new(Box::new(owned.into_iter()), key)
    }

    #[test]
    fn test_admits_under_capacity() {
        let mut buffer = buffer_over(vec!["https://a.example/1"]);
        match buffer.pull(0, 25, |_| true) {
            Pull::Admitted(item) => assert_eq!(item.domain, "a.example"),
            _ => panic!("expected admission"),
        }
    }

    #[test]
    fn test_exhaustion_is_sticky() {
        let mut buffer = buffer_over(vec![]);
        assert!(matches!(buffer.pull(0, 25, |_| false), Pull::Exhausted));
        assert!(matches!(buffer.pull(0, 25, |_| false), Pull::Exhausted));
        assert!(buffer.is_drained());
    }

    #[test]
    fn test_blocks_on_known_domain_when_full() {
        let mut buffer = buffer_over(vec!["https://a.example/1"]);
        assert!(matches!(buffer.pull(25, 25, |_| true), Pull::Blocked));
        assert!(!buffer.is_drained());

        // The blocked head is admitted once space frees, preserving order
        match buffer.pull(24, 25, |_| true) {
            Pull::Admitted(item) => assert_eq!(item.url, "https://a.example/1"),
            _ => panic!("expected admission"),
        }
    }

    #[test]
    fn test_new_domain_bypasses_full_buffer() {
        let mut buffer = buffer_over(vec!["https://new.example/1"]);
        match buffer.pull(25, 25, |_| false) {
            Pull::Admitted(item) => assert_eq!(item.domain, "new.example"),
            _ => panic!("expected admission"),
        }
    }

    #[test]
    fn test_no_domain_item_bypasses_full_buffer() {
        let mut buffer = buffer_over(vec!["not a url"]);
        match buffer.pull(25, 25, |_| true) {
            Pull::Admitted(item) => assert_eq!(item.domain, ""),
            _ => panic!("expected admission"),
        }
    }

    #[test]
    fn test_blocked_head_does_not_reread_input() {
        let mut buffer = buffer_over(vec!["https://a.example/1", "https://a.example/2"]);
        assert!(matches!(buffer.pull(25, 25, |_| true), Pull::Blocked));
        assert!(matches!(buffer.pull(25, 25, |_| true), Pull::Blocked));

        match buffer.pull(0, 25, |_| true) {
            Pull::Admitted(item) => assert_eq!(item.url, "https://a.example/1"),
            _ => panic!("expected admission"),
        }
        match buffer.pull(1, 25, |_| true) {
            Pull::Admitted(item) => assert_eq!(item.url, "https://a.example/2"),
            _ => panic!("expected admission"),
        }
    }
}
