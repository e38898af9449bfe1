// Concurrent candidate runner
//
// Evaluates an async boolean test over a (possibly unbounded, lazily
// produced) candidate sequence on a bounded pool of tokio tasks and reports
// whether any candidate passed. Dispatch stops at the first success or when
// the stop signal is raised; tasks already running are awaited until the
// run's deadline.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use crate::context::StopSignal;

#[derive(Debug, Clone)]
pub struct TaskRunner {
    workers: usize,
    await_timeout: Duration,
}

impl TaskRunner {
    pub fn new(workers: usize, await_timeout: Duration) -> Self {
        Self {
            workers: workers.max(1),
            await_timeout,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Returns true iff at least one dispatched candidate passed `test`
    /// before the await timeout expired.
    ///
    /// A worker slot is acquired before the next candidate is pulled, so at
    /// most `workers` candidates are alive at any time. The timeout covers
    /// the whole call: waiting for a slot and draining the last tasks.
    pub async fn run<T, I, F, Fut>(&self, test: F, candidates: I, stop: &StopSignal) -> bool
    where
        T: Send + 'static,
        I: IntoIterator<Item = T>,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let deadline = Instant::now() + self.await_timeout;
        let succeeded = Arc::new(AtomicBool::new(false));
        let slots = Arc::new(Semaphore::new(self.workers));
        let test = Arc::new(test);
        let mut tasks = JoinSet::new();
        let mut candidates = candidates.into_iter().peekable();
        let mut dispatched = 0usize;
        let mut timed_out = false;

        loop {
            if succeeded.load(Ordering::SeqCst) || stop.is_stopped() {
                break;
            }
            if candidates.peek().is_none() {
                break;
            }
            let slot = match timeout_at(deadline, slots.clone().acquire_owned()).await {
                Ok(Ok(slot)) => slot,
                Ok(Err(_)) => break,
                Err(_) => {
                    timed_out = true;
                    break;
                }
            };
            // a worker may have won while we waited for the slot
            if succeeded.load(Ordering::SeqCst) || stop.is_stopped() {
                break;
            }
            let Some(candidate) = candidates.next() else {
                break;
            };

            let test = Arc::clone(&test);
            let succeeded = Arc::clone(&succeeded);
            let stop = stop.clone();
            tasks.spawn(async move {
                let _slot = slot;
                if succeeded.load(Ordering::SeqCst) || stop.is_stopped() {
                    return;
                }
                if test(candidate).await {
                    succeeded.store(true, Ordering::SeqCst);
                }
            });
            dispatched += 1;

            while let Some(done) = tasks.try_join_next() {
                log_join_error(done);
            }
        }

        if !timed_out {
            timed_out = timeout_at(deadline, async {
                while let Some(done) = tasks.join_next().await {
                    log_join_error(done);
                }
            })
            .await
            .is_err();
        }

        // results arriving after the deadline are not counted
        let found = succeeded.load(Ordering::SeqCst);
        if timed_out {
            warn!(
                "[JWT] timed out after {:?} with {} verification tasks pending, treating them as misses",
                self.await_timeout,
                tasks.len()
            );
            tasks.abort_all();
        }

        debug!("[JWT] runner dispatched {} candidates, success: {}", dispatched, found);
        found
    }
}

fn log_join_error(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            warn!("[JWT] verification task panicked: {}", e);
        }
    }
}
