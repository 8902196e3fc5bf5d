use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    /// All slots are running and the wait queue is full.
    #[error("invocation pool overloaded")]
    Overloaded,
}

/// Admission control for model invocations.
///
/// At most `max_concurrent` invocations run at once and at most `max_queued`
/// callers wait for a slot. Anyone beyond that is turned away immediately.
#[derive(Debug, Clone)]
pub struct InvocationPool {
    permits: Arc<Semaphore>,
    queued: Arc<AtomicUsize>,
    max_concurrent: usize,
    max_queued: usize,
}

/// Held for the duration of one invocation.
#[derive(Debug)]
pub struct InvocationSlot {
    _permit: OwnedSemaphorePermit,
}

struct QueueGuard<'a>(&'a AtomicUsize);

impl Drop for QueueGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl InvocationPool {
    pub fn new(max_concurrent: usize, max_queued: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
            queued: Arc::new(AtomicUsize::new(0)),
            max_concurrent,
            max_queued,
        }
    }

    pub async fn acquire(&self) -> Result<InvocationSlot, AdmissionError> {
        if let Ok(permit) = self.permits.clone().try_acquire_owned() {
            return Ok(InvocationSlot { _permit: permit });
        }

        let ahead = self.queued.fetch_add(1, Ordering::SeqCst);
        // Decrements on every exit path, including the caller being cancelled.
        let _guard = QueueGuard(&self.queued);
        if ahead >= self.max_queued {
            return Err(AdmissionError::Overloaded);
        }

        // Only fails on a closed semaphore; this one is never closed.
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AdmissionError::Overloaded)?;
        Ok(InvocationSlot { _permit: permit })
    }

    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.permits.available_permits()
    }

    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn max_queued(&self) -> usize {
        self.max_queued
    }
}
