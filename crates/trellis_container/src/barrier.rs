//! The sequential bootstrap barrier.
//!
//! Every call to [`Container::pause_for`](crate::Container::pause_for) appends
//! one step to a single chain. Step `n` only starts once step `n - 1` has
//! finished, and every resolution awaits the chain as it stood when the
//! resolution began. A failing step fails the rest of the chain; the error is
//! handed to every waiter.
//!
//! The chain is a lazy shared future: steps only make progress while
//! something awaits it.

use core::future::Future;
use core::sync::atomic::{AtomicUsize, Ordering};

use futures::FutureExt;
use futures::future::Shared;
use parking_lot::Mutex;

use crate::entry::BoxFuture;
use crate::error::ContainerError;

type Chain = Shared<BoxFuture<'static, Result<(), ContainerError>>>;

/// Serialized chain of bootstrap steps.
pub(crate) struct Barrier {
    chain: Mutex<Chain>,
    steps: AtomicUsize,
}

impl Barrier {
    pub(crate) fn new() -> Self {
        let settled: BoxFuture<'static, Result<(), ContainerError>> =
            Box::pin(futures::future::ready(Ok(())));
        Self {
            chain: Mutex::new(settled.shared()),
            steps: AtomicUsize::new(0),
        }
    }

    /// Appends `step` to the chain.
    pub(crate) fn extend<F>(&self, step: F)
    where
        F: Future<Output = Result<(), ContainerError>> + Send + 'static,
    {
        let index = self.steps.fetch_add(1, Ordering::SeqCst);
        let mut chain = self.chain.lock();
        let previous = chain.clone();
        let next: BoxFuture<'static, Result<(), ContainerError>> = Box::pin(async move {
            previous.await?;
            tracing::trace!(step = index, "running bootstrap step");
            let outcome = step.await;
            if let Err(err) = &outcome {
                tracing::warn!(step = index, error = %err, "bootstrap step failed");
            }
            outcome
        });
        *chain = next.shared();
    }

    /// Returns a future completing once every step appended so far has run.
    pub(crate) fn wait(&self) -> Chain {
        self.chain.lock().clone()
    }

    /// Number of steps ever appended.
    pub(crate) fn steps(&self) -> usize {
        self.steps.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn empty_barrier_is_settled() {
        let barrier = Barrier::new();
        assert!(barrier.wait().await.is_ok());
        assert_eq!(barrier.steps(), 0);
    }

    #[tokio::test]
    async fn steps_run_in_append_order() {
        let barrier = Barrier::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let log = Arc::clone(&log);
            barrier.extend(async move {
                tokio::task::yield_now().await;
                log.lock().push(i);
                Ok(())
            });
        }

        barrier.wait().await.unwrap();
        assert_eq!(*log.lock(), vec![0, 1, 2]);
        assert_eq!(barrier.steps(), 3);
    }

    #[tokio::test]
    async fn failing_step_poisons_later_steps() {
        let barrier = Barrier::new();
        let ran = Arc::new(Mutex::new(false));

        barrier.extend(async { Err(ContainerError::custom("loader crashed")) });
        let ran_clone = Arc::clone(&ran);
        barrier.extend(async move {
            *ran_clone.lock() = true;
            Ok(())
        });

        let err = barrier.wait().await.unwrap_err();
        assert_eq!(err.to_string(), "loader crashed");
        assert!(!*ran.lock());
    }
}
