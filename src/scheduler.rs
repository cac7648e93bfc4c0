//! Fixed-delay scheduling primitives
//!
//! [`repeat`] drives a background loop that can be cancelled between
//! iterations; [`poll_until`] waits inline for a remote value to reach a
//! terminal state.

use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Handle to a loop started by [`repeat`]
pub struct RepeatHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<u64>,
}

impl RepeatHandle {
    /// Stop the loop before its next iteration. An action already running
    /// is allowed to finish.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to end; returns how many iterations completed
    pub async fn join(self) -> Result<u64> {
        // Keep the sender alive until the loop is done, or it would read as a cancel
        let RepeatHandle { cancel, task } = self;
        let result = task
            .await
            .map_err(|e| Error::Task(format!("repeat loop failed: {}", e)));
        drop(cancel);
        result
    }
}

/// Run `action` every `interval` until `should_continue` rejects its output
/// or the returned handle is cancelled (or dropped).
pub fn repeat<F, Fut, T, P>(mut action: F, mut should_continue: P, interval: Duration) -> RepeatHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send,
    T: Send + 'static,
    P: FnMut(&T) -> bool + Send + 'static,
{
    let (cancel, mut cancelled) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut iterations = 0u64;
        loop {
            if *cancelled.borrow() {
                debug!(iterations, "Repeat loop cancelled");
                break;
            }

            let output = action().await;
            iterations += 1;
            if !should_continue(&output) {
                debug!(iterations, "Repeat loop finished");
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = cancelled.changed() => {
                    if changed.is_err() {
                        debug!(iterations, "Repeat handle dropped");
                        break;
                    }
                }
            }
        }
        iterations
    });

    RepeatHandle { cancel, task }
}

/// How [`poll_until`] paces itself and when it gives up
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Failed fetches tolerated in a row; one more returns the error
    pub max_consecutive_errors: u32,
    /// Overall deadline
    pub timeout: Option<Duration>,
}

impl PollPolicy {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            max_consecutive_errors: 0,
            timeout: None,
        }
    }

    pub fn with_max_consecutive_errors(mut self, max: u32) -> Self {
        self.max_consecutive_errors = max;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Call `fetch` every `policy.interval` until `done` accepts its value
pub async fn poll_until<F, Fut, T, D>(mut fetch: F, mut done: D, policy: PollPolicy) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    D: FnMut(&T) -> bool,
{
    let polling = async {
        let mut consecutive_errors = 0u32;
        loop {
            match fetch().await {
                Ok(value) => {
                    consecutive_errors = 0;
                    if done(&value) {
                        return Ok(value);
                    }
                }
                Err(e) => {
                    consecutive_errors += 1;
                    if consecutive_errors > policy.max_consecutive_errors {
                        return Err(e);
                    }
                    warn!(
                        error = %e,
                        consecutive_errors,
                        "Poll failed, retrying"
                    );
                }
            }
            tokio::time::sleep(policy.interval).await;
        }
    };

    match policy.timeout {
        Some(limit) => tokio::time::timeout(limit, polling)
            .await
            .map_err(|_| Error::Timeout(limit))?,
        None => polling.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    const TICK: Duration = Duration::from_millis(5);

    #[tokio::test]
    async fn repeat_stops_when_predicate_rejects() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let handle = repeat(
            move || {
                let c = c.clone();
                async move { c.fetch_add(1, Ordering::SeqCst) + 1 }
            },
            |n: &u32| *n < 3,
            TICK,
        );

        assert_eq!(handle.join().await.unwrap(), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancel_stops_between_iterations() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let handle = repeat(
            move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                }
            },
            |_| true,
            Duration::from_secs(3600),
        );

        // First iteration runs immediately, then the loop sleeps for an hour
        while counter.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        handle.cancel();
        let iterations = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .expect("cancel should interrupt the wait")
            .unwrap();
        assert_eq!(iterations, 1);
    }

    #[tokio::test]
    async fn in_flight_action_finishes_after_cancel() {
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let mut started_tx = Some(started_tx);
        let finished = Arc::new(AtomicU32::new(0));
        let f = finished.clone();
        let handle = repeat(
            move || {
                let started = started_tx.take();
                let f = f.clone();
                async move {
                    if let Some(tx) = started {
                        let _ = tx.send(());
                    }
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    f.fetch_add(1, Ordering::SeqCst);
                }
            },
            |_| true,
            TICK,
        );

        started_rx.await.unwrap();
        handle.cancel();
        assert_eq!(handle.join().await.unwrap(), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn poll_until_returns_first_accepted_value() {
        let calls = &AtomicU32::new(0);
        let value = poll_until(
            move || async move { Ok(calls.fetch_add(1, Ordering::SeqCst)) },
            |n| *n == 2,
            PollPolicy::every(TICK),
        )
        .await;
        assert_eq!(assert_ok!(value), 2);
    }

    #[tokio::test]
    async fn poll_until_tolerates_error_streak_within_budget() {
        let calls = &AtomicU32::new(0);
        let value = poll_until(
            move || async move {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 | 1 => Err(Error::Console("flaky".into())),
                    n => Ok(n),
                }
            },
            |_| true,
            PollPolicy::every(TICK).with_max_consecutive_errors(2),
        )
        .await;
        assert_eq!(assert_ok!(value), 2);
    }

    #[tokio::test]
    async fn poll_until_gives_up_after_error_streak() {
        let calls = &AtomicU32::new(0);
        let result: Result<u32> = poll_until(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Console("down".into()))
            },
            |_| true,
            PollPolicy::every(TICK).with_max_consecutive_errors(2),
        )
        .await;
        let err = assert_err!(result);
        assert_eq!(err.to_string(), "Console API error: down");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn poll_until_times_out() {
        let timeout = Duration::from_millis(30);
        let result = poll_until(
            move || async move { Ok(()) },
            |_| false,
            PollPolicy::every(TICK).with_timeout(Some(timeout)),
        )
        .await;
        assert!(matches!(result, Err(Error::Timeout(t)) if t == timeout));
    }
}
