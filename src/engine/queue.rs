//! Per-domain FIFO with throttle and parallelism bookkeeping

use crate::engine::item::Item;
use std::collections::VecDeque;
use std::time::Instant;

/// Which scheduler structure currently references this queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Membership {
    /// In the ready deque
    Ready,
    /// In the waiting heap, keyed by `next_eligible_at`
    Waiting,
    /// In neither set (at capacity, mid-dispatch, or empty-but-busy)
    Detached,
}

/// Pending items for one domain, in input order
///
/// A queue tracks how many of its items are currently on workers
/// (`in_flight`) and the earliest instant the domain may be hit again
/// (`next_eligible_at`, pushed forward at every completion).
pub(crate) struct DomainQueue<T> {
    pub domain: String,
    items: VecDeque<Item<T>>,
    pub in_flight: usize,
    pub next_eligible_at: Instant,
    pub last_completed_at: Option<Instant>,
    pub membership: Membership,
}

impl<T> DomainQueue<T> {
    pub fn new(domain: String, now: Instant) -> Self {
        Self {
            domain,
            items: VecDeque::new(),
            in_flight: 0,
            next_eligible_at: now,
            last_completed_at: None,
            membership: Membership::Detached,
        }
    }

    pub fn enqueue(&mut self, item: Item<T>) {
        self.items.push_back(item);
    }

    pub fn dequeue(&mut self) -> Option<Item<T>> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True while the domain is below its parallelism cap
    pub fn has_capacity(&self, parallelism: usize) -> bool {
        self.in_flight < parallelism
    }

    /// True once the throttle window has elapsed
    pub fn eligible(&self, now: Instant) -> bool {
        self.next_eligible_at <= now
    }

    /// Records a completion: one job left the wire, the throttle restarts
    pub fn record_completion(&mut self, now: Instant, throttle: std::time::Duration) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.last_completed_at = Some(now);
        self.next_eligible_at = now + throttle;
    }
}
