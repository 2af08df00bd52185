//! Sequential job dispatcher.
//!
//! A single long-lived task that drains the [`JobQueue`] one job at a
//! time:
//!
//! ```text
//! Idle ──(queue non-empty)──▶ Submitting ──(job id)──▶ Active
//!  ▲                              │                      │
//!  └──────(submission failed)─────┘                      │
//!  └────────────────────(terminal event)──────────────────┘
//! ```
//!
//! After a terminal event the dispatcher is `Idle` for the settle delay
//! before it looks at the queue again. `Draining` is entered on shutdown. The n-th job is never submitted
//! before the (n-1)-th reaches a terminal state, which keeps the
//! single-instance backend from being overloaded.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

use ccbell_core::backend::{GenerationBackend, PushChannelFactory};
use ccbell_core::job::QueuedJob;
use ccbell_core::progress::{ProgressEvent, STAGE_QUEUED};
use ccbell_core::readiness::ModelReadiness;
use ccbell_core::types::{JobToken, ServerJobId};

use crate::channel::ProgressChannel;
use crate::config::OrchestratorConfig;
use crate::events::OrchestratorEvent;
use crate::queue::JobQueue;
use crate::reconciler::Reconciler;
use crate::source::PollSettings;

/// Buffer between the adapter task and the dispatcher loop.
const PROGRESS_BUFFER: usize = 32;

/// Error recorded when the adapter task stops without a terminal event.
pub const CHANNEL_ENDED_MESSAGE: &str = "Progress channel ended unexpectedly";

/// Error recorded when the adapter task panics.
pub const CHANNEL_CRASHED_MESSAGE: &str = "Progress channel crashed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatcherState {
    Idle,
    Submitting,
    Active,
    Draining,
}

/// Snapshot of the job currently being generated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InFlightJob {
    pub job: QueuedJob,
    pub job_id: ServerJobId,
    pub progress: f32,
    pub stage: String,
}

struct ActiveSlot {
    token: JobToken,
    cancel: CancellationToken,
}

/// Observation and control surface of a dispatcher. Cheap to clone.
#[derive(Clone)]
pub struct DispatcherHandle {
    state: Arc<watch::Sender<DispatcherState>>,
    in_flight: Arc<watch::Sender<Option<InFlightJob>>>,
    active: Arc<Mutex<Option<ActiveSlot>>>,
}

impl DispatcherHandle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(DispatcherState::Idle);
        let (in_flight, _) = watch::channel(None);
        Self {
            state: Arc::new(state),
            in_flight: Arc::new(in_flight),
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn state(&self) -> DispatcherState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<DispatcherState> {
        self.state.subscribe()
    }

    pub fn in_flight(&self) -> Option<InFlightJob> {
        self.in_flight.borrow().clone()
    }

    pub fn subscribe_in_flight(&self) -> watch::Receiver<Option<InFlightJob>> {
        self.in_flight.subscribe()
    }

    /// Advisory cancel of the job being submitted or generated.
    ///
    /// Returns `false` if `token` is not the current job. The backend is
    /// not asked to abort; only the client-side channel is torn down.
    pub fn cancel(&self, token: JobToken) -> bool {
        let slot = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(active) if active.token == token => {
                active.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    fn set_state(&self, state: DispatcherState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            tracing::trace!(from = ?current, to = ?state, "Dispatcher state");
            *current = state;
            true
        });
    }

    fn begin(&self, token: JobToken) -> CancellationToken {
        let cancel = CancellationToken::new();
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(ActiveSlot {
            token,
            cancel: cancel.clone(),
        });
        cancel
    }

    fn finish(&self) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.in_flight.send_replace(None);
    }
}

impl Default for DispatcherHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// How an active job left the `Active` state.
enum Outcome {
    Finished,
    Cancelled,
    Shutdown,
}

pub struct Dispatcher {
    queue: JobQueue,
    reconciler: Arc<Reconciler>,
    backend: Arc<dyn GenerationBackend>,
    push: Arc<dyn PushChannelFactory>,
    readiness: watch::Receiver<ModelReadiness>,
    events: broadcast::Sender<OrchestratorEvent>,
    config: OrchestratorConfig,
    handle: DispatcherHandle,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: JobQueue,
        reconciler: Arc<Reconciler>,
        backend: Arc<dyn GenerationBackend>,
        push: Arc<dyn PushChannelFactory>,
        readiness: watch::Receiver<ModelReadiness>,
        events: broadcast::Sender<OrchestratorEvent>,
        config: OrchestratorConfig,
        handle: DispatcherHandle,
    ) -> Self {
        Self {
            queue,
            reconciler,
            backend,
            push,
            readiness,
            events,
            config,
            handle,
        }
    }

    pub fn handle(&self) -> DispatcherHandle {
        self.handle.clone()
    }

    /// Run the dispatcher loop until the cancellation token is triggered.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(
            settle_ms = self.config.settle_delay.as_millis() as u64,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Dispatcher started",
        );
        let mut queue_rx = self.queue.subscribe();
        let mut model_ready = false;

        loop {
            self.handle.set_state(DispatcherState::Idle);

            // Idle: wait for work.
            while self.queue.is_empty() {
                tokio::select! {
                    _ = shutdown.cancelled() => return self.drain(),
                    changed = queue_rx.changed() => {
                        if changed.is_err() {
                            return self.drain();
                        }
                    }
                }
            }

            // The first job of a session waits for the model.
            if !model_ready {
                match self.wait_for_model(&shutdown).await {
                    None => return self.drain(),
                    Some(Ok(())) => model_ready = true,
                    Some(Err(message)) => {
                        if let Some(job) = self.queue.dequeue_head() {
                            tracing::error!(token = %job.token, error = %message, "Model unavailable, job failed");
                            self.reconciler.fail(job.token, message);
                        }
                        // One failure per error episode; the rest wait for the gate to move.
                        tokio::select! {
                            _ = shutdown.cancelled() => return self.drain(),
                            changed = self.readiness.changed() => {
                                if changed.is_err() {
                                    tracing::warn!("Readiness gate gone, dispatching without it");
                                    model_ready = true;
                                }
                            }
                        }
                        continue;
                    }
                }
            }

            // Claim the slot before popping the job: a concurrent removal
            // then finds it either still queued or active.
            let Some(token) = self.queue.head_token() else {
                continue;
            };
            let job_cancel = self.handle.begin(token);
            let Some(job) = self.queue.dequeue_if_head(token) else {
                self.handle.finish();
                continue;
            };

            match self.dispatch(job, job_cancel, &shutdown).await {
                Some(Outcome::Shutdown) => return self.drain(),
                Some(Outcome::Finished | Outcome::Cancelled) => {
                    self.handle.set_state(DispatcherState::Idle);
                    tokio::select! {
                        _ = shutdown.cancelled() => return self.drain(),
                        _ = tokio::time::sleep(self.config.settle_delay) => {}
                    }
                }
                None => {}
            }
        }
    }

    fn drain(&self) {
        self.handle.set_state(DispatcherState::Draining);
        self.handle.finish();
        tracing::info!(queued = self.queue.len(), "Dispatcher shutting down");
    }

    /// `None` on shutdown, otherwise whether the model became ready.
    async fn wait_for_model(&mut self, shutdown: &CancellationToken) -> Option<Result<(), String>> {
        loop {
            let readiness = self.readiness.borrow_and_update().clone();
            match readiness {
                ModelReadiness::Ready => return Some(Ok(())),
                ModelReadiness::Error { message } => return Some(Err(message)),
                other => {
                    tracing::debug!(state = other.label(), "Waiting for model before first job");
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => return None,
                changed = self.readiness.changed() => {
                    if changed.is_err() {
                        tracing::warn!("Readiness gate gone, dispatching without it");
                        return Some(Ok(()));
                    }
                }
            }
        }
    }

    /// Submit one job and follow it to a terminal state.
    ///
    /// Returns `None` when the job never became active.
    async fn dispatch(
        &self,
        job: QueuedJob,
        job_cancel: CancellationToken,
        shutdown: &CancellationToken,
    ) -> Option<Outcome> {
        let token = job.token;
        if job_cancel.is_cancelled() {
            tracing::info!(token = %token, "Job cancelled before submission");
            self.reconciler.cancel(token);
            self.handle.finish();
            return Some(Outcome::Cancelled);
        }
        self.handle.set_state(DispatcherState::Submitting);

        let submitted = tokio::select! {
            _ = shutdown.cancelled() => return Some(Outcome::Shutdown),
            result = self.backend.submit(&job.request) => result,
        };

        let job_id = match submitted {
            Ok(job_id) => job_id,
            Err(e) => {
                tracing::error!(token = %token, error = %e, "Submission failed");
                self.reconciler.fail(token, e.to_string());
                self.handle.finish();
                return None;
            }
        };

        if job_cancel.is_cancelled() {
            tracing::info!(token = %token, job_id = %job_id, "Job cancelled during submission");
            self.reconciler.cancel(token);
            self.delete_in_background(job_id);
            self.handle.finish();
            return Some(Outcome::Cancelled);
        }

        tracing::info!(token = %token, job_id = %job_id, hook = %job.request.hook_type, "Job submitted");
        self.reconciler.bind_server_id(token, &job_id);
        self.handle.in_flight.send_replace(Some(InFlightJob {
            job,
            job_id: job_id.clone(),
            progress: 0.0,
            stage: STAGE_QUEUED.into(),
        }));
        self.handle.set_state(DispatcherState::Active);

        let outcome = self.follow(token, job_id, &job_cancel, shutdown).await;
        if !matches!(outcome, Outcome::Shutdown) {
            self.handle.finish();
        }
        Some(outcome)
    }

    async fn follow(
        &self,
        token: JobToken,
        job_id: ServerJobId,
        job_cancel: &CancellationToken,
        shutdown: &CancellationToken,
    ) -> Outcome {
        let (tx, mut rx) = mpsc::channel(PROGRESS_BUFFER);
        let mut task = tokio::spawn(pump(
            job_id.clone(),
            Arc::clone(&self.backend),
            Arc::clone(&self.push),
            self.config.poll_settings(),
            self.events.clone(),
            tx,
        ));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    // Fire-and-forget: the backend keeps the job.
                    task.abort();
                    tracing::info!(token = %token, job_id = %job_id, "Released in-flight job on shutdown");
                    return Outcome::Shutdown;
                }
                _ = job_cancel.cancelled() => {
                    task.abort();
                    tracing::info!(token = %token, job_id = %job_id, "In-flight job cancelled");
                    self.reconciler.cancel(token);
                    return Outcome::Cancelled;
                }
                received = rx.recv() => match received {
                    Some(event) => {
                        if let ProgressEvent::Progress(update) = &event {
                            self.handle.in_flight.send_modify(|slot| {
                                if let Some(in_flight) = slot {
                                    in_flight.progress = update.progress;
                                    in_flight.stage = update.stage.clone();
                                }
                            });
                        }
                        self.reconciler.apply(token, &event);
                        if event.is_terminal() {
                            return Outcome::Finished;
                        }
                    }
                    None => {
                        let message = match (&mut task).await {
                            Err(e) if e.is_panic() => CHANNEL_CRASHED_MESSAGE,
                            _ => CHANNEL_ENDED_MESSAGE,
                        };
                        tracing::error!(token = %token, job_id = %job_id, error = message, "Progress channel lost");
                        self.reconciler.fail(token, message);
                        return Outcome::Finished;
                    }
                }
            }
        }
    }

    fn delete_in_background(&self, job_id: ServerJobId) {
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            if let Err(e) = backend.delete_job(&job_id).await {
                tracing::warn!(job_id = %job_id, error = %e, "Best-effort job deletion failed");
            }
        });
    }
}

/// Adapter task: forward events until the terminal one.
async fn pump(
    job_id: ServerJobId,
    backend: Arc<dyn GenerationBackend>,
    push: Arc<dyn PushChannelFactory>,
    poll: PollSettings,
    events: broadcast::Sender<OrchestratorEvent>,
    tx: mpsc::Sender<ProgressEvent>,
) {
    let mut channel = ProgressChannel::open(job_id, backend, push.as_ref(), poll, Some(events)).await;

    while let Some(event) = channel.next().await {
        let terminal = event.is_terminal();
        if tx.send(event).await.is_err() || terminal {
            break;
        }
    }
}
