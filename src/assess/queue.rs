//! Backpressured assessment submission façade.
//!
//! Callers submit chunks one at a time; the queue bounds how many are in
//! flight and drains waiters in FIFO order. Counters expose the queue's
//! state for `status` reporting.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Semaphore;

use crate::assess::assessor::{AssessConfig, Assessor};
use crate::assess::Assessment;
use crate::core::Chunk;
use crate::error::{AssessError, Result};

/// Snapshot of queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Submissions currently being assessed.
    pub active: usize,
    /// Submissions waiting for a slot.
    pub pending: usize,
    /// Submissions that completed (with or without ratings).
    pub completed: usize,
    /// Submissions that failed with an orchestration error.
    pub failed: usize,
}

/// Bounded-concurrency façade over the assessor.
///
/// At most `max_concurrent` submissions run at once; excess submitters
/// wait on a fair semaphore, so the queue drains in submission order.
/// Failures propagate to their own submitter only.
pub struct AssessmentQueue {
    assessor: Assessor,
    config: AssessConfig,
    semaphore: Arc<Semaphore>,
    active: AtomicUsize,
    pending: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

impl AssessmentQueue {
    /// Builds a queue over the assessor with the given configuration.
    #[must_use]
    pub fn new(assessor: Assessor, config: AssessConfig) -> Self {
        let slots = config.max_concurrent.max(1);
        Self {
            assessor,
            config,
            semaphore: Arc::new(Semaphore::new(slots)),
            active: AtomicUsize::new(0),
            pending: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    /// Submits one chunk and resolves with its assessments.
    ///
    /// # Errors
    ///
    /// Returns an orchestration error if the queue is shut down while the
    /// submission waits; provider-level failures do not error, they just
    /// thin the returned assessments.
    pub async fn submit(&self, chunk: Chunk) -> Result<Vec<Assessment>> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        let permit = self.semaphore.acquire().await;
        self.pending.fetch_sub(1, Ordering::SeqCst);

        let Ok(_permit) = permit else {
            self.failed.fetch_add(1, Ordering::SeqCst);
            return Err(AssessError::Orchestration("queue closed".to_string()).into());
        };

        self.active.fetch_add(1, Ordering::SeqCst);
        let assessments = self.assessor.assess_chunk(&chunk, &self.config).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);

        Ok(assessments)
    }

    /// Current counter snapshot.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            active: self.active.load(Ordering::SeqCst),
            pending: self.pending.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }

    /// Closes the queue: waiting submissions fail, running ones finish.
    pub fn shutdown(&self) {
        self.semaphore.close();
    }
}
