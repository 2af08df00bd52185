//! Progress channel adapter.
//!
//! Wraps the live status feed of one server job. The push transport is
//! tried first; any transport failure before a terminal event switches
//! the adapter to polling for the rest of the job. Callers see a single
//! ordered sequence of [`ProgressEvent`]s ending in exactly one terminal
//! event, after which [`ProgressChannel::next`] returns `None`.
//!
//! Progress is clamped to the highest value seen so far, so a poll that
//! lags behind the push channel cannot make the entry regress.

use std::sync::Arc;

use tokio::sync::broadcast;

use ccbell_core::backend::{GenerationBackend, PushChannelFactory, TransportError};
use ccbell_core::progress::{ProgressEvent, ProgressUpdate};
use ccbell_core::types::ServerJobId;

use crate::events::OrchestratorEvent;
use crate::source::{PollSettings, PollSource, ProgressSource, PushSource, TransportKind};

enum Mode {
    Push(PushSource),
    Polling(PollSource),
    Closed,
}

pub struct ProgressChannel {
    job_id: ServerJobId,
    backend: Arc<dyn GenerationBackend>,
    poll: PollSettings,
    mode: Mode,
    high_water: f32,
    last_stage: Option<String>,
    events: Option<broadcast::Sender<OrchestratorEvent>>,
}

impl ProgressChannel {
    /// Attach to a job, opening the push channel if possible.
    pub async fn open(
        job_id: ServerJobId,
        backend: Arc<dyn GenerationBackend>,
        push: &dyn PushChannelFactory,
        poll: PollSettings,
        events: Option<broadcast::Sender<OrchestratorEvent>>,
    ) -> Self {
        let mut channel = Self {
            job_id,
            backend,
            poll,
            mode: Mode::Closed,
            high_water: 0.0,
            last_stage: None,
            events,
        };

        match push.open(&channel.job_id).await {
            Ok(stream) => {
                tracing::debug!(job_id = %channel.job_id, "Push channel opened");
                channel.mode = Mode::Push(PushSource::new(stream));
            }
            Err(e) => channel.fall_back(e),
        }

        channel
    }

    pub fn job_id(&self) -> &ServerJobId {
        &self.job_id
    }

    /// Active transport, or `None` once closed.
    pub fn transport(&self) -> Option<TransportKind> {
        match &self.mode {
            Mode::Push(source) => Some(source.kind()),
            Mode::Polling(source) => Some(source.kind()),
            Mode::Closed => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.mode, Mode::Closed)
    }

    /// Next event for the job. `None` after the terminal event.
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        loop {
            let received = match &mut self.mode {
                Mode::Push(source) => source.next_event().await,
                Mode::Polling(source) => source.next_event().await,
                Mode::Closed => return None,
            };

            match received {
                Ok(event) => {
                    if let Some(event) = self.accept(event) {
                        return Some(event);
                    }
                }
                Err(e) if matches!(self.mode, Mode::Push(_)) => self.fall_back(e),
                Err(e) => {
                    // Polling has nowhere left to fall back to.
                    tracing::error!(job_id = %self.job_id, error = %e, "Status polling abandoned");
                    self.close();
                    return Some(ProgressEvent::failed(e.to_string()));
                }
            }
        }
    }

    /// Release the transport. Safe to call any number of times.
    pub fn close(&mut self) -> bool {
        if self.is_closed() {
            return false;
        }
        // Dropping the push source cancels its session and closes the socket.
        self.mode = Mode::Closed;
        tracing::debug!(job_id = %self.job_id, "Progress channel closed");
        true
    }

    /// Filter and normalize an event. Returns `None` for updates that
    /// carry nothing new.
    fn accept(&mut self, event: ProgressEvent) -> Option<ProgressEvent> {
        match event {
            ProgressEvent::Progress(update) => {
                let progress = update.progress.max(self.high_water);
                if progress == self.high_water
                    && self.last_stage.as_deref() == Some(update.stage.as_str())
                {
                    return None;
                }
                self.high_water = progress;
                self.last_stage = Some(update.stage.clone());
                Some(ProgressEvent::Progress(ProgressUpdate::new(progress, update.stage)))
            }
            terminal => {
                self.close();
                Some(terminal)
            }
        }
    }

    fn fall_back(&mut self, error: TransportError) {
        tracing::warn!(
            job_id = %self.job_id,
            error = %error,
            "Push channel failed, falling back to status polling",
        );
        if let Some(events) = &self.events {
            let _ = events.send(OrchestratorEvent::TransportFallback {
                job_id: self.job_id.clone(),
                reason: error.to_string(),
            });
        }
        self.mode = Mode::Polling(PollSource::new(
            Arc::clone(&self.backend),
            self.job_id.clone(),
            self.poll,
        ));
    }
}

impl Drop for ProgressChannel {
    fn drop(&mut self) {
        self.close();
    }
}
