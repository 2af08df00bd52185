//! Application-level state container.
//!
//! Owns the queue, the library, the reconciler, the readiness gate and
//! the dispatcher, and exposes the operations the UI layer needs:
//! enqueue, explicit removal, packs, and subscriptions to the live state.
//!
//! Background tasks are started with [`Orchestrator::start`] and stopped
//! with [`Orchestrator::shutdown`]. Each task receives a child token of
//! the orchestrator's root cancellation token.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ccbell_core::backend::{GenerationBackend, PushChannelFactory};
use ccbell_core::job::QueuedJob;
use ccbell_core::readiness::ModelReadiness;
use ccbell_core::request::{GenerationRequest, ModelId};
use ccbell_core::sound::{GeneratedSound, SoundPack};
use ccbell_core::types::{PackId, ServerJobId, SoundId};
use ccbell_core::CoreError;

use crate::config::OrchestratorConfig;
use crate::dispatcher::{Dispatcher, DispatcherHandle, DispatcherState, InFlightJob};
use crate::error::OrchestratorError;
use crate::events::{OrchestratorEvent, EVENT_CHANNEL_CAPACITY};
use crate::library::{Library, LibraryStore};
use crate::queue::JobQueue;
use crate::readiness::ReadinessGate;
use crate::reconciler::Reconciler;

pub struct Orchestrator {
    queue: JobQueue,
    reconciler: Arc<Reconciler>,
    backend: Arc<dyn GenerationBackend>,
    push: Arc<dyn PushChannelFactory>,
    gate: ReadinessGate,
    dispatcher: DispatcherHandle,
    events: broadcast::Sender<OrchestratorEvent>,
    config: OrchestratorConfig,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        push: Arc<dyn PushChannelFactory>,
        library: LibraryStore,
        config: OrchestratorConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let gate = ReadinessGate::new(
            Arc::clone(&backend),
            config.model,
            config.readiness_poll_interval,
            config.max_poll_failures,
            events.clone(),
        );

        Self {
            queue: JobQueue::new(),
            reconciler: Arc::new(Reconciler::new(library, events.clone())),
            backend,
            push,
            gate,
            dispatcher: DispatcherHandle::new(),
            events,
            config,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the readiness gate and the dispatcher.
    ///
    /// Calling this more than once has no effect.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if !tasks.is_empty() {
            tracing::warn!("Orchestrator already started");
            return;
        }

        let gate = self.gate.clone();
        let gate_cancel = self.cancel.child_token();
        tasks.push(tokio::spawn(async move { gate.run(gate_cancel).await }));

        let dispatcher = Dispatcher::new(
            self.queue.clone(),
            Arc::clone(&self.reconciler),
            Arc::clone(&self.backend),
            Arc::clone(&self.push),
            self.gate.subscribe(),
            self.events.clone(),
            self.config.clone(),
            self.dispatcher.clone(),
        );
        tasks.push(tokio::spawn(dispatcher.run(self.cancel.child_token())));

        tracing::info!(model = %self.config.model, "Orchestrator started");
    }

    /// Stop background tasks and wait for them to exit.
    ///
    /// The in-flight job, if any, is released without cancelling it on
    /// the backend.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let tasks: Vec<_> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Orchestrator task failed");
            }
        }
        tracing::info!("Orchestrator stopped");
    }

    // ---- packs ----

    pub fn create_pack(&self, name: impl Into<String>, theme: Option<String>, model: ModelId) -> PackId {
        let pack = SoundPack::new(name, theme, model);
        let id = pack.id;
        tracing::info!(pack_id = %id, name = %pack.name, "Pack created");
        self.library().add_pack(pack);
        id
    }

    /// Remove a pack and every sound in it. Returns the number of sounds
    /// removed.
    pub fn remove_pack(&self, pack_id: PackId) -> Result<usize, OrchestratorError> {
        if self.library().pack(pack_id).is_none() {
            return Err(CoreError::NotFound {
                entity: "pack",
                id: pack_id.to_string(),
            }
            .into());
        }

        let sound_ids: Vec<SoundId> = self
            .library()
            .snapshot()
            .sounds_in_pack(pack_id)
            .map(|s| s.id)
            .collect();
        for id in &sound_ids {
            self.remove_sound(*id)?;
        }
        self.library().remove_pack(pack_id);

        tracing::info!(pack_id = %pack_id, sounds = sound_ids.len(), "Pack removed");
        Ok(sound_ids.len())
    }

    // ---- jobs ----

    /// Accept a request: validate it, create its library entry and queue it.
    pub fn enqueue(&self, pack_id: PackId, request: GenerationRequest) -> Result<SoundId, OrchestratorError> {
        self.ensure_pack(pack_id)?;
        request.validate()?;
        Ok(self.accept(pack_id, request))
    }

    /// Enqueue several requests in order. Nothing is queued if any
    /// request is invalid.
    pub fn enqueue_batch(
        &self,
        pack_id: PackId,
        requests: Vec<GenerationRequest>,
    ) -> Result<Vec<SoundId>, OrchestratorError> {
        self.ensure_pack(pack_id)?;
        for request in &requests {
            request.validate()?;
        }
        Ok(requests
            .into_iter()
            .map(|request| self.accept(pack_id, request))
            .collect())
    }

    /// Explicitly remove a library entry.
    ///
    /// A queued job is dropped from the queue; the in-flight job is
    /// cancelled client-side. Server artifacts are deleted best-effort.
    pub fn remove_sound(&self, sound_id: SoundId) -> Result<GeneratedSound, OrchestratorError> {
        if let Some(token) = self.reconciler.token_for(sound_id) {
            if self.queue.remove(token).is_some() {
                self.reconciler.cancel(token);
            } else if !self.dispatcher.cancel(token) {
                // Terminal event is being applied right now.
                self.reconciler.forget(token);
            }
        }

        let removed = self
            .library()
            .remove_sound(sound_id)
            .ok_or_else(|| CoreError::NotFound {
                entity: "sound",
                id: sound_id.to_string(),
            })?;

        if let Some(job_id) = removed.job_id.clone() {
            self.delete_in_background(job_id);
        }

        tracing::info!(sound_id = %sound_id, status = removed.status.as_str(), "Sound removed");
        Ok(removed)
    }

    /// Ask the readiness gate to retry a failed model load.
    pub fn reload_model(&self) -> bool {
        self.gate.reload()
    }

    // ---- observation ----

    pub fn library(&self) -> &LibraryStore {
        self.reconciler.library()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queued(&self) -> Vec<QueuedJob> {
        self.queue.snapshot()
    }

    pub fn subscribe_queue(&self) -> watch::Receiver<VecDeque<QueuedJob>> {
        self.queue.subscribe()
    }

    pub fn subscribe_library(&self) -> watch::Receiver<Library> {
        self.library().subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> DispatcherState {
        self.dispatcher.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<DispatcherState> {
        self.dispatcher.subscribe_state()
    }

    pub fn in_flight(&self) -> Option<InFlightJob> {
        self.dispatcher.in_flight()
    }

    pub fn readiness(&self) -> ModelReadiness {
        self.gate.current()
    }

    pub fn subscribe_readiness(&self) -> watch::Receiver<ModelReadiness> {
        self.gate.subscribe()
    }

    // ---- internals ----

    fn ensure_pack(&self, pack_id: PackId) -> Result<(), CoreError> {
        match self.library().pack(pack_id) {
            Some(_) => Ok(()),
            None => Err(CoreError::NotFound {
                entity: "pack",
                id: pack_id.to_string(),
            }),
        }
    }

    fn accept(&self, pack_id: PackId, request: GenerationRequest) -> SoundId {
        let sound = GeneratedSound::pending(pack_id, &request);
        let sound_id = sound.id;
        let job = QueuedJob::new(pack_id, request);

        self.library().insert_sound(sound);
        self.reconciler.track(job.token, sound_id);
        tracing::info!(
            token = %job.token,
            sound_id = %sound_id,
            hook = %job.request.hook_type,
            "Generation queued",
        );
        self.queue.enqueue(job);
        sound_id
    }

    fn delete_in_background(&self, job_id: ServerJobId) {
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            match backend.delete_job(&job_id).await {
                Ok(()) => tracing::debug!(job_id = %job_id, "Server artifacts deleted"),
                Err(e) => {
                    tracing::warn!(job_id = %job_id, error = %e, "Best-effort job deletion failed")
                }
            }
        });
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
