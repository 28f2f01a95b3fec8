//! The work-dispatch engine
//!
//! This module wires the pieces together: the staging buffer admits input
//! under a memory cap, the scheduler groups items into per-domain queues and
//! hands them to a fixed pool of worker threads, and the outcome stream
//! delivers one record per item in completion order.

mod buffer;
mod item;
mod queue;
mod scheduler;
mod stream;
mod worker;

pub use item::Item;
pub(crate) use item::KeyFn;
pub use stream::{Outcome, Outcomes};

use crate::engine::buffer::DomainBuffer;
use crate::engine::scheduler::Scheduler;
use crate::policy::{Policy, Throttle};
use crate::TrawlError;
use std::any::Any;
use std::sync::Arc;
use std::thread;

/// Worker-pool and scheduling knobs
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Number of worker threads
    pub threads: usize,

    /// Maximum simultaneous in-flight requests per domain
    pub domain_parallelism: usize,

    /// Maximum items staged ahead of dispatch
    pub buffer_size: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            threads: 25,
            domain_parallelism: 1,
            buffer_size: 25,
        }
    }
}

/// A configured engine, ready to run over an input stream
///
/// The engine is generic over the payload type `T` and the policy `P`; the
/// policy decides what a "job" means (fetch one document, resolve one
/// redirect chain).
pub struct Engine<T, P> {
    policy: Arc<P>,
    throttle: Throttle<T>,
    key: KeyFn<T>,
    options: EngineOptions,
}

impl<T, P> Engine<T, P>
where
    T: Send + 'static,
    P: Policy<T> + 'static,
{
    /// Creates an engine over payloads that are themselves URL strings
    pub fn new(policy: P, options: EngineOptions) -> Self
    where
        T: AsRef<str>,
    {
        Self {
            policy: Arc::new(policy),
            throttle: Throttle::default(),
            key: Arc::new(|payload: &T| Some(payload.as_ref().to_string())),
            options,
        }
    }

    /// Creates an engine with a custom key extractor
    ///
    /// The extractor maps a payload to its URL; returning `None` marks the
    /// item URL-less. It runs under panic isolation, so a panicking
    /// extractor costs only the offending item.
    pub fn with_key_extractor<F>(policy: P, options: EngineOptions, key: F) -> Self
    where
        F: Fn(&T) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            policy: Arc::new(policy),
            throttle: Throttle::default(),
            key: Arc::new(key),
            options,
        }
    }

    /// Replaces the default throttle
    pub fn with_throttle(mut self, throttle: Throttle<T>) -> Self {
        self.throttle = throttle;
        self
    }

    /// Starts the worker pool over `input` and returns the outcome stream
    ///
    /// The input is read lazily, only as far as staging admits; it may be
    /// infinite. Workers begin pulling immediately.
    pub fn run<I>(self, input: I) -> Result<Outcomes<T, P::Output>, TrawlError>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        let buffer = DomainBuffer::new(Box::new(input.into_iter()), self.key.clone());
        let scheduler = Arc::new(Scheduler::new(
            buffer,
            self.options.domain_parallelism,
            self.options.buffer_size,
        ));

        let threads = self.options.threads.max(1);
        let (sender, receiver) = crossbeam_channel::bounded(threads);

        tracing::debug!(
            threads,
            domain_parallelism = self.options.domain_parallelism,
            buffer_size = self.options.buffer_size,
            "starting engine"
        );

        let mut workers = Vec::with_capacity(threads);
        for id in 0..threads {
            let handle = {
                let scheduler = Arc::clone(&scheduler);
                let policy = Arc::clone(&self.policy);
                let throttle = self.throttle.clone();
                let sender = sender.clone();
                thread::Builder::new()
                    .name(format!("trawl-worker-{id}"))
                    .spawn(move || worker::run_worker(id, scheduler, policy, throttle, sender))
            };

            match handle {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    scheduler.cancel();
                    drop(sender);
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(TrawlError::Io(err));
                }
            }
        }
        drop(sender);

        let cancel_target = Arc::clone(&scheduler);
        let cancel: Arc<dyn Fn() + Send + Sync> = Arc::new(move || cancel_target.cancel());

        Ok(Outcomes::new(receiver, cancel, workers))
    }
}

/// Renders a caught panic payload as text, preserving the original message
pub(crate) fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic of unknown type".to_string()
    }
}
