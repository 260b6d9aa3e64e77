//! Non-blocking admission gate for bounded concurrency
//!
//! A [`Limiter`] holds N tokens. [`Limiter::try_run`] never waits for one:
//! when none is free it fails with [`AtCapacity`] immediately. Crawl steps fan
//! out recursively, so a step may need admission while others hold tokens;
//! waiting on the semaphore there could deadlock, retrying cannot.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Upper bound (exclusive) of the randomized retry delay
pub const MAX_BACKOFF: Duration = Duration::from_millis(500);

/// Returned when every token is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("limiter at capacity")]
pub struct AtCapacity;

/// Counting semaphore with try-or-fail admission
#[derive(Debug, Clone)]
pub struct Limiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl Limiter {
    /// Creates a limiter seeded with `capacity` tokens
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Runs `fut` if a token is free, returning the token afterwards
    ///
    /// Never blocks waiting for admission.
    pub async fn try_run<F>(&self, fut: F) -> Result<F::Output, AtCapacity>
    where
        F: Future,
    {
        let _permit = self.semaphore.try_acquire().map_err(|_| AtCapacity)?;
        Ok(fut.await)
    }

    /// Runs the future produced by `make` once admitted
    ///
    /// Each rejected attempt sleeps a uniformly random delay below
    /// [`MAX_BACKOFF`] and tries again, indefinitely. `make` is only called
    /// after a token has been taken.
    pub async fn run_with_backoff<F, Fut>(&self, mut make: F) -> Fut::Output
    where
        F: FnMut() -> Fut,
        Fut: Future,
    {
        loop {
            if let Ok(_permit) = self.semaphore.try_acquire() {
                return make().await;
            }
            tokio::time::sleep(random_backoff(MAX_BACKOFF)).await;
        }
    }

    /// Tokens currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Uniformly random duration in `[0, max)`
pub(crate) fn random_backoff(max: Duration) -> Duration {
    let millis = max.as_millis() as u64;
    if millis == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(fastrand::u64(0..millis))
}
