//! The work-dispatch kernel
//!
//! One mutex guards all scheduling state; one condition variable wakes
//! workers on completions, cancellation and throttle expiry. Workers call
//! [`Scheduler::next_job`] in a loop; everything else (input pulling, queue
//! promotion, garbage collection) happens inside that call, so the engine
//! needs no dispatcher thread.
//!
//! Non-empty domain queues live in exactly one of two structures: a ready
//! deque (FIFO over domain arrival, which doubles as a round-robin) or a
//! waiting min-heap keyed by `next_eligible_at`. Heap entries can go stale
//! when a completion re-times a domain; they are validated against the
//! queue's current state on pop and dropped when they no longer match.

use crate::engine::buffer::{DomainBuffer, Pull};
use crate::engine::item::Item;
use crate::engine::queue::{DomainQueue, Membership};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// What a worker gets back from the scheduler
pub(crate) enum NextJob<T> {
    Job(Item<T>),
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct WaitingEntry {
    at: Instant,
    seq: u64,
    domain: String,
}

pub(crate) struct Scheduler<T> {
    core: Mutex<SchedulerCore<T>>,
    work_ready: Condvar,
    parallelism: usize,
    buffer_size: usize,
}

struct SchedulerCore<T> {
    buffer: DomainBuffer<T>,
    queues: HashMap<String, DomainQueue<T>>,
    ready: VecDeque<String>,
    waiting: BinaryHeap<Reverse<WaitingEntry>>,
    /// No-domain items: dispatched before anything else, never throttled
    direct: VecDeque<Item<T>>,
    waiting_seq: u64,
    /// Items staged in `queues` + `direct`, excluding in-flight
    buffered: usize,
    in_flight: usize,
    cancelled: bool,
    finished: bool,
}

impl<T> Scheduler<T> {
    pub fn new(buffer: DomainBuffer<T>, parallelism: usize, buffer_size: usize) -> Self {
        Self {
            core: Mutex::new(SchedulerCore {
                buffer,
                queues: HashMap::new(),
                ready: VecDeque::new(),
                waiting: BinaryHeap::new(),
                direct: VecDeque::new(),
                waiting_seq: 0,
                buffered: 0,
                in_flight: 0,
                cancelled: false,
                finished: false,
            }),
            work_ready: Condvar::new(),
            parallelism: parallelism.max(1),
            buffer_size: buffer_size.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerCore<T>> {
        match self.core.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("scheduler invariant violated: state lock poisoned");
                poisoned.into_inner()
            }
        }
    }

    /// Hands out the next dispatchable item, blocking until one exists
    ///
    /// Returns `Shutdown` once the input is exhausted and every admitted
    /// item has completed, or when the run is cancelled.
    pub fn next_job(&self) -> NextJob<T> {
        let mut core = self.lock();

        loop {
            if core.cancelled || core.finished {
                return NextJob::Shutdown;
            }

            // Unconstrained path: no-domain items go out immediately
            if let Some(item) = core.direct.pop_front() {
                core.buffered -= 1;
                core.in_flight += 1;
                self.nudge_if_work_remains(&core);
                return NextJob::Job(item);
            }

            let now = Instant::now();
            core.promote_expired(now, self.parallelism);

            if let Some(item) = core.dispatch_ready(now, self.parallelism) {
                self.nudge_if_work_remains(&core);
                return NextJob::Job(item);
            }
            if core.cancelled {
                self.work_ready.notify_all();
                return NextJob::Shutdown;
            }

            if core.fill_from_input(now, self.buffer_size, self.parallelism) {
                continue;
            }

            if core.is_drained() {
                core.finished = true;
                self.work_ready.notify_all();
                tracing::debug!("input drained, broadcasting shutdown");
                return NextJob::Shutdown;
            }

            core = match core.next_expiry(now) {
                Some(timeout) => {
                    tracing::trace!(?timeout, "no eligible work, waiting for throttle expiry");
                    self.wait_timeout(core, timeout)
                }
                None => {
                    tracing::trace!("no eligible work, waiting for a completion");
                    self.wait(core)
                }
            };
        }
    }

    /// Records the completion of a job on `domain`
    ///
    /// `throttle` was evaluated by the completing worker outside this lock;
    /// the domain may not be hit again before `now + throttle`.
    pub fn complete(&self, domain: &str, throttle: Duration) {
        let mut core = self.lock();
        let now = Instant::now();
        core.in_flight = core.in_flight.saturating_sub(1);
        core.settle_queue(domain, now, throttle, self.parallelism);
        self.work_ready.notify_all();
    }

    /// Records the completion of an unconstrained (no-domain) job
    pub fn complete_direct(&self) {
        let mut core = self.lock();
        core.in_flight = core.in_flight.saturating_sub(1);
        self.work_ready.notify_all();
    }

    /// Cancels the run; workers drain out after their current job
    pub fn cancel(&self) {
        let mut core = self.lock();
        if !core.cancelled {
            core.cancelled = true;
            tracing::debug!("engine cancelled");
        }
        self.work_ready.notify_all();
    }

    /// Wakes one more worker when dispatchable work is still queued
    fn nudge_if_work_remains(&self, core: &SchedulerCore<T>) {
        if !core.ready.is_empty() || !core.direct.is_empty() {
            self.work_ready.notify_one();
        }
    }

    fn wait<'a>(&self, core: MutexGuard<'a, SchedulerCore<T>>) -> MutexGuard<'a, SchedulerCore<T>> {
        match self.work_ready.wait(core) {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("scheduler invariant violated: state lock poisoned");
                poisoned.into_inner()
            }
        }
    }

    fn wait_timeout<'a>(
        &self,
        core: MutexGuard<'a, SchedulerCore<T>>,
        timeout: Duration,
    ) -> MutexGuard<'a, SchedulerCore<T>> {
        match self.work_ready.wait_timeout(core, timeout) {
            Ok((guard, _)) => guard,
            Err(poisoned) => {
                tracing::error!("scheduler invariant violated: state lock poisoned");
                poisoned.into_inner().0
            }
        }
    }
}

impl<T> SchedulerCore<T> {
    /// Moves every waiting domain whose throttle expired into the ready set
    ///
    /// Stale heap entries (re-timed or drained domains) are discarded here;
    /// empty idle queues whose throttle window has passed are garbage
    /// collected.
    fn promote_expired(&mut self, now: Instant, parallelism: usize) {
        loop {
            match self.waiting.peek() {
                Some(Reverse(entry)) if entry.at <= now => {}
                _ => break,
            }
            let Some(Reverse(entry)) = self.waiting.pop() else {
                break;
            };

            let Some(queue) = self.queues.get_mut(&entry.domain) else {
                continue;
            };
            if queue.membership != Membership::Waiting || queue.next_eligible_at != entry.at {
                continue;
            }

            if queue.is_empty() {
                if queue.in_flight == 0 {
                    tracing::trace!(domain = %entry.domain, "collecting idle domain queue");
                    self.queues.remove(&entry.domain);
                } else {
                    queue.membership = Membership::Detached;
                }
            } else if queue.has_capacity(parallelism) {
                queue.membership = Membership::Ready;
                tracing::trace!(domain = %entry.domain, "throttle expired, domain ready");
                self.ready.push_back(entry.domain);
            } else {
                queue.membership = Membership::Detached;
            }
        }
    }

    /// Pops ready domains until one yields a dispatchable item
    ///
    /// Entries whose queue got re-timed by a completion while sitting in the
    /// deque are rerouted to the waiting heap instead of dispatched.
    fn dispatch_ready(&mut self, now: Instant, parallelism: usize) -> Option<Item<T>> {
        while let Some(domain) = self.ready.pop_front() {
            let Some(queue) = self.queues.get_mut(&domain) else {
                tracing::error!(
                    domain = %domain,
                    "scheduler invariant violated: ready domain missing from index"
                );
                self.cancelled = true;
                return None;
            };

            if queue.membership != Membership::Ready {
                continue;
            }
            if queue.is_empty() || !queue.has_capacity(parallelism) {
                queue.membership = Membership::Detached;
                continue;
            }
            if !queue.eligible(now) {
                let at = queue.next_eligible_at;
                queue.membership = Membership::Waiting;
                self.waiting_seq += 1;
                self.waiting.push(Reverse(WaitingEntry {
                    at,
                    seq: self.waiting_seq,
                    domain,
                }));
                continue;
            }

            let Some(item) = queue.dequeue() else {
                queue.membership = Membership::Detached;
                continue;
            };
            queue.in_flight += 1;
            tracing::trace!(
                domain = %domain,
                in_flight = queue.in_flight,
                queued = queue.len(),
                "dispatching job"
            );
            if !queue.is_empty() && queue.has_capacity(parallelism) {
                self.ready.push_back(domain);
            } else {
                queue.membership = Membership::Detached;
            }
            self.buffered -= 1;
            self.in_flight += 1;
            return Some(item);
        }
        None
    }

    /// Pulls admitted input into domain queues
    ///
    /// Stops once dispatchable work exists and the buffer is at capacity,
    /// or when the input blocks or runs dry. Returns whether anything was
    /// admitted.
    fn fill_from_input(&mut self, now: Instant, capacity: usize, parallelism: usize) -> bool {
        let mut admitted = false;
        loop {
            if !self.direct.is_empty() {
                break;
            }
            if !self.ready.is_empty() && self.buffered >= capacity {
                break;
            }

            let buffered = self.buffered;
            let queues = &self.queues;
            let pull = self
                .buffer
                .pull(buffered, capacity, |domain| queues.contains_key(domain));

            match pull {
                Pull::Admitted(item) => {
                    admitted = true;
                    self.admit(item, now, parallelism);
                }
                Pull::Blocked | Pull::Exhausted => break,
            }
        }
        admitted
    }

    /// Stages one admitted item into its domain queue (or the direct FIFO)
    fn admit(&mut self, item: Item<T>, now: Instant, parallelism: usize) {
        self.buffered += 1;

        if item.domain.is_empty() {
            self.direct.push_back(item);
            return;
        }

        let SchedulerCore {
            queues,
            ready,
            waiting,
            waiting_seq,
            ..
        } = self;

        let domain = item.domain.clone();
        let queue = queues
            .entry(domain.clone())
            .or_insert_with(|| DomainQueue::new(domain.clone(), now));
        queue.enqueue(item);

        if queue.membership == Membership::Detached && queue.has_capacity(parallelism) {
            if queue.eligible(now) {
                queue.membership = Membership::Ready;
                ready.push_back(domain);
            } else {
                queue.membership = Membership::Waiting;
                *waiting_seq += 1;
                waiting.push(Reverse(WaitingEntry {
                    at: queue.next_eligible_at,
                    seq: *waiting_seq,
                    domain,
                }));
            }
        }
    }

    /// Applies a completion to a domain queue and re-files it
    fn settle_queue(&mut self, domain: &str, now: Instant, throttle: Duration, parallelism: usize) {
        let SchedulerCore {
            queues,
            ready,
            waiting,
            waiting_seq,
            ..
        } = self;

        let Some(queue) = queues.get_mut(domain) else {
            tracing::error!(
                domain = %domain,
                "scheduler invariant violated: completion for unindexed domain"
            );
            self.cancelled = true;
            return;
        };

        queue.record_completion(now, throttle);

        if queue.is_empty() {
            if queue.in_flight == 0 {
                if queue.eligible(now) {
                    queues.remove(domain);
                } else {
                    // Keep the throttle memory until the window passes, then
                    // let promote_expired collect the empty queue.
                    queue.membership = Membership::Waiting;
                    *waiting_seq += 1;
                    waiting.push(Reverse(WaitingEntry {
                        at: queue.next_eligible_at,
                        seq: *waiting_seq,
                        domain: domain.to_string(),
                    }));
                }
            }
            return;
        }

        if !queue.has_capacity(parallelism) {
            return;
        }

        if queue.eligible(now) {
            if queue.membership != Membership::Ready {
                queue.membership = Membership::Ready;
                ready.push_back(domain.to_string());
            }
        } else if queue.membership != Membership::Ready {
            // Ready-deque entries self-correct on pop; everything else gets
            // a fresh heap entry for the new expiry.
            queue.membership = Membership::Waiting;
            *waiting_seq += 1;
            waiting.push(Reverse(WaitingEntry {
                at: queue.next_eligible_at,
                seq: *waiting_seq,
                domain: domain.to_string(),
            }));
        }
    }

    fn is_drained(&self) -> bool {
        self.buffer.is_drained() && self.buffered == 0 && self.in_flight == 0
    }

    /// Time until the earliest waiting entry, if any
    ///
    /// Stale entries may cause an early wake-up; the dispatch loop simply
    /// revalidates and waits again.
    fn next_expiry(&self, now: Instant) -> Option<Duration> {
        self.waiting
            .peek()
            .map(|Reverse(entry)| entry.at.saturating_duration_since(now))
    }
}
