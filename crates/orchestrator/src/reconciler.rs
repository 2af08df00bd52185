//! Library reconciler.
//!
//! Maps progress and terminal events, keyed by local [`JobToken`], onto
//! the [`GeneratedSound`](ccbell_core::sound::GeneratedSound) entry
//! created at enqueue time. The token-to-entry link lives only until the
//! terminal event has been applied.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;

use ccbell_core::progress::ProgressEvent;
use ccbell_core::types::{JobToken, ServerJobId, SoundId};

use crate::events::OrchestratorEvent;
use crate::library::LibraryStore;

pub struct Reconciler {
    library: LibraryStore,
    links: Mutex<HashMap<JobToken, SoundId>>,
    events: broadcast::Sender<OrchestratorEvent>,
}

impl Reconciler {
    pub fn new(library: LibraryStore, events: broadcast::Sender<OrchestratorEvent>) -> Self {
        Self {
            library,
            links: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub fn library(&self) -> &LibraryStore {
        &self.library
    }

    /// Link a queued job to its library entry.
    pub fn track(&self, token: JobToken, sound_id: SoundId) {
        self.links().insert(token, sound_id);
    }

    /// Drop the link without touching the entry.
    pub fn forget(&self, token: JobToken) -> Option<SoundId> {
        self.links().remove(&token)
    }

    pub fn sound_for(&self, token: JobToken) -> Option<SoundId> {
        self.links().get(&token).copied()
    }

    /// Token linked to a library entry, if the entry still has a live job.
    pub fn token_for(&self, sound_id: SoundId) -> Option<JobToken> {
        self.links()
            .iter()
            .find(|(_, id)| **id == sound_id)
            .map(|(token, _)| *token)
    }

    pub fn tracked(&self) -> usize {
        self.links().len()
    }

    /// Record the server job id assigned at submission.
    pub fn bind_server_id(&self, token: JobToken, job_id: &ServerJobId) -> bool {
        let Some(sound_id) = self.sound_for(token) else {
            return false;
        };
        let bound = self
            .library
            .update_sound(sound_id, |sound| sound.mark_started(job_id.clone()));
        if bound {
            self.emit(OrchestratorEvent::JobSubmitted {
                token,
                sound_id,
                job_id: job_id.clone(),
            });
        }
        bound
    }

    /// Apply one event to the linked entry.
    ///
    /// Returns whether the entry changed. Events for unknown tokens, for
    /// entries that were removed, or for entries already finalized are
    /// ignored. A terminal event discards the link.
    pub fn apply(&self, token: JobToken, event: &ProgressEvent) -> bool {
        let Some(sound_id) = self.sound_for(token) else {
            return false;
        };

        let changed = match event {
            ProgressEvent::Progress(update) => self.library.update_sound(sound_id, |sound| {
                sound.apply_progress(update.progress, &update.stage)
            }),
            ProgressEvent::Completed { audio_url } => self
                .library
                .update_sound(sound_id, |sound| sound.complete(audio_url.clone())),
            ProgressEvent::Failed { error } => self
                .library
                .update_sound(sound_id, |sound| sound.fail(error.clone())),
        };

        if event.is_terminal() {
            self.forget(token);
        }

        if changed {
            self.emit(match event {
                ProgressEvent::Progress(update) => OrchestratorEvent::JobProgress {
                    token,
                    sound_id,
                    progress: update.progress,
                    stage: update.stage.clone(),
                },
                ProgressEvent::Completed { audio_url } => {
                    tracing::info!(token = %token, sound_id = %sound_id, "Sound completed");
                    OrchestratorEvent::JobCompleted {
                        token,
                        sound_id,
                        audio_url: audio_url.clone(),
                    }
                }
                ProgressEvent::Failed { error } => {
                    tracing::error!(token = %token, sound_id = %sound_id, error = %error, "Sound failed");
                    OrchestratorEvent::JobFailed {
                        token,
                        sound_id,
                        error: error.clone(),
                    }
                }
            });
        }

        changed
    }

    /// Finalize the linked entry as failed.
    pub fn fail(&self, token: JobToken, error: impl Into<String>) -> bool {
        self.apply(token, &ProgressEvent::failed(error))
    }

    /// Discard the link of a cancelled job and announce it.
    pub fn cancel(&self, token: JobToken) {
        if let Some(sound_id) = self.forget(token) {
            self.emit(OrchestratorEvent::JobCancelled { token, sound_id });
        }
    }

    pub(crate) fn emit(&self, event: OrchestratorEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn links(&self) -> std::sync::MutexGuard<'_, HashMap<JobToken, SoundId>> {
        self.links.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
