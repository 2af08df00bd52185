//! Job queue store.
//!
//! An ordered FIFO of [`QueuedJob`]s. Every mutation replaces the
//! collection inside a [`tokio::sync::watch`] channel, so subscribers
//! are notified synchronously and never observe a half-applied change.
//! Jobs are never reordered.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::watch;

use ccbell_core::job::QueuedJob;
use ccbell_core::types::JobToken;

/// Shared handle to the pending-job queue. Cheap to clone.
#[derive(Clone)]
pub struct JobQueue {
    tx: Arc<watch::Sender<VecDeque<QueuedJob>>>,
}

impl JobQueue {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(VecDeque::new());
        Self { tx: Arc::new(tx) }
    }

    /// Append a job to the tail.
    pub fn enqueue(&self, job: QueuedJob) {
        tracing::debug!(token = %job.token, "Job enqueued");
        self.tx.send_modify(|queue| queue.push_back(job));
    }

    /// Remove and return the oldest job, or `None` when empty.
    pub fn dequeue_head(&self) -> Option<QueuedJob> {
        let mut popped = None;
        self.tx.send_if_modified(|queue| {
            popped = queue.pop_front();
            popped.is_some()
        });
        popped
    }

    /// Token of the oldest job, without removing it.
    pub fn head_token(&self) -> Option<JobToken> {
        self.tx.borrow().front().map(|job| job.token)
    }

    /// Remove and return the oldest job only if it is still `token`.
    pub fn dequeue_if_head(&self, token: JobToken) -> Option<QueuedJob> {
        let mut popped = None;
        self.tx.send_if_modified(|queue| {
            if queue.front().is_some_and(|job| job.token == token) {
                popped = queue.pop_front();
            }
            popped.is_some()
        });
        popped
    }

    /// Remove a specific job before it is dispatched.
    ///
    /// Returns the removed job, or `None` if it is no longer queued
    /// (already dispatched or never enqueued).
    pub fn remove(&self, token: JobToken) -> Option<QueuedJob> {
        let mut removed = None;
        self.tx.send_if_modified(|queue| {
            if let Some(pos) = queue.iter().position(|job| job.token == token) {
                removed = queue.remove(pos);
            }
            removed.is_some()
        });
        if removed.is_some() {
            tracing::debug!(token = %token, "Job removed from queue");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    pub fn contains(&self, token: JobToken) -> bool {
        self.tx.borrow().iter().any(|job| job.token == token)
    }

    /// Copy of the current queue contents, head first.
    pub fn snapshot(&self) -> Vec<QueuedJob> {
        self.tx.borrow().iter().cloned().collect()
    }

    /// Subscribe to queue changes. `borrow().len()` gives the live length.
    pub fn subscribe(&self) -> watch::Receiver<VecDeque<QueuedJob>> {
        self.tx.subscribe()
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}
