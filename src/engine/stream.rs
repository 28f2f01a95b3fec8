//! The lazy output side of the engine

use crate::FetchError;
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::thread::JoinHandle;

/// The terminal record for one input item
///
/// Emission order is completion order, not input order; `payload` carries
/// the caller's original value for correlation.
#[derive(Debug)]
pub struct Outcome<T, O> {
    pub url: String,
    pub domain: String,
    pub payload: T,
    pub result: Result<O, FetchError>,
}

/// Lazy sequence of outcomes, one per admitted input item
///
/// Iteration blocks until a result is available or the engine shuts down.
/// Dropping the iterator cancels the run: workers finish their current job,
/// unreported staged items are discarded, and all threads are joined.
pub struct Outcomes<T, O> {
    receiver: Option<Receiver<Outcome<T, O>>>,
    cancel: Arc<dyn Fn() + Send + Sync>,
    workers: Vec<JoinHandle<()>>,
}

impl<T, O> Outcomes<T, O> {
    pub(crate) fn new(
        receiver: Receiver<Outcome<T, O>>,
        cancel: Arc<dyn Fn() + Send + Sync>,
        workers: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            receiver: Some(receiver),
            cancel,
            workers,
        }
    }
}

impl<T, O> Iterator for Outcomes<T, O> {
    type Item = Outcome<T, O>;

    fn next(&mut self) -> Option<Self::Item> {
        // The channel disconnects once every worker has exited and dropped
        // its sender; that is the termination signal.
        self.receiver.as_ref()?.recv().ok()
    }
}

impl<T, O> Drop for Outcomes<T, O> {
    fn drop(&mut self) {
        (self.cancel)();
        // Disconnect the channel before joining so workers blocked on a full
        // channel observe the send error and exit.
        self.receiver.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("worker thread panicked outside the policy sandbox");
            }
        }
    }
}
