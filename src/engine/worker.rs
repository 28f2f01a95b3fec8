//! The worker loop: ask for a job, run the policy, publish the outcome
//!
//! Workers are symmetric; none is pinned to a domain. A policy panic is
//! caught and converted into a `policy_panic` outcome, so a single bad item
//! never takes a worker down.

use crate::engine::item::Item;
use crate::engine::scheduler::{NextJob, Scheduler};
use crate::engine::stream::Outcome;
use crate::policy::{Policy, Throttle};
use crate::FetchError;
use crossbeam_channel::Sender;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

pub(crate) fn run_worker<T, P>(
    id: usize,
    scheduler: Arc<Scheduler<T>>,
    policy: Arc<P>,
    throttle: Throttle<T>,
    sender: Sender<Outcome<T, P::Output>>,
) where
    T: Send + 'static,
    P: Policy<T>,
{
    tracing::debug!(worker = id, "worker started");

    loop {
        let item = match scheduler.next_job() {
            NextJob::Job(item) => item,
            NextJob::Shutdown => break,
        };

        let domain = item.domain.clone();
        let mut result = execute(policy.as_ref(), &item);

        // The throttle callback runs here, on the completing worker, so user
        // code can never stall the scheduler lock.
        if domain.is_empty() {
            scheduler.complete_direct();
        } else {
            let pause = match throttle.evaluate(&domain, &item) {
                Ok(pause) => pause,
                Err(message) => {
                    result = Err(FetchError::PolicyPanic(message));
                    Duration::ZERO
                }
            };
            scheduler.complete(&domain, pause);
        }

        let outcome = Outcome {
            url: item.url.clone(),
            domain,
            payload: item.payload,
            result,
        };
        if sender.send(outcome).is_err() {
            // Consumer is gone; stop producing and tell everyone else.
            scheduler.cancel();
            break;
        }
    }

    tracing::debug!(worker = id, "worker exiting");
}

/// Runs the policy on one item under panic isolation
fn execute<T, P: Policy<T>>(policy: &P, item: &Item<T>) -> Result<P::Output, FetchError> {
    if let Some(message) = &item.tainted {
        return Err(FetchError::PolicyPanic(message.clone()));
    }

    match catch_unwind(AssertUnwindSafe(|| policy.run(item))) {
        Ok(result) => result,
        Err(panic) => Err(FetchError::PolicyPanic(super::panic_message(panic))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::item::KeyFn;

    struct PanickingPolicy;

    impl Policy<String> for PanickingPolicy {
        type Output = ();

        fn run(&self, _item: &Item<String>) -> Result<(), FetchError> {
            panic!("boom");
        }
    }

    struct OkPolicy;

    impl Policy<String> for OkPolicy {
        type Output = String;

        fn run(&self, item: &Item<String>) -> Result<String, FetchError> {
            Ok(item.url.clone())
        }
    }

    fn make_item(url: &str) -> Item<String> {
        let key: KeyFn<String> = Arc::new(|value: &String| Some(value.clone()));
        Item::from_payload(url.to_string(), &key)
    }

    #[test]
    fn test_execute_catches_policy_panic() {
        let item = make_item("https://example.com/");
        let result = execute(&PanickingPolicy, &item);
        match result {
            Err(FetchError::PolicyPanic(message)) => assert_eq!(message, "boom"),
            other => panic!("expected policy_panic, got {other:?}"),
        }
    }

    #[test]
    fn test_execute_passes_success_through() {
        let item = make_item("https://example.com/");
        let result = execute(&OkPolicy, &item);
        assert_eq!(result.unwrap(), "https://example.com/");
    }

    #[test]
    fn test_tainted_item_skips_the_policy() {
        let key: KeyFn<String> = Arc::new(|_| panic!("bad key"));
        let item = Item::from_payload("x".to_string(), &key);

        // PanickingPolicy would blow up if invoked; the taint short-circuits
        let result = execute(&PanickingPolicy, &item);
        match result {
            Err(FetchError::PolicyPanic(message)) => assert_eq!(message, "bad key"),
            other => panic!("expected policy_panic, got {other:?}"),
        }
    }
}
