//! Model readiness gate.
//!
//! Polls the backend's model status until the selected model is `ready`.
//! The first time it sees `idle` it requests a load, so the common path
//! never needs a manual "load model" step. Polling continues through
//! `error`: a model error or a run of failed status polls is published,
//! and the gate moves on as soon as the backend reports something else.
//! The current state is published on a [`watch`] channel that the
//! dispatcher waits on before the first submission of a session.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch, Notify};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use ccbell_core::backend::GenerationBackend;
use ccbell_core::readiness::{LoadOutcome, ModelReadiness};
use ccbell_core::request::ModelId;

use crate::events::OrchestratorEvent;

/// Handle to the readiness poller. Cheap to clone.
#[derive(Clone)]
pub struct ReadinessGate {
    backend: Arc<dyn GenerationBackend>,
    model: ModelId,
    poll_interval: Duration,
    max_failures: u32,
    state: Arc<watch::Sender<ModelReadiness>>,
    reload: Arc<Notify>,
    events: broadcast::Sender<OrchestratorEvent>,
}

impl ReadinessGate {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        model: ModelId,
        poll_interval: Duration,
        max_failures: u32,
        events: broadcast::Sender<OrchestratorEvent>,
    ) -> Self {
        let (state, _) = watch::channel(ModelReadiness::Unknown);
        Self {
            backend,
            model,
            poll_interval,
            max_failures: max_failures.max(1),
            state: Arc::new(state),
            reload: Arc::new(Notify::new()),
            events,
        }
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    pub fn current(&self) -> ModelReadiness {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ModelReadiness> {
        self.state.subscribe()
    }

    /// Request a new load after an error. Ignored in other states.
    pub fn reload(&self) -> bool {
        if !matches!(*self.state.borrow(), ModelReadiness::Error { .. }) {
            return false;
        }
        self.reload.notify_one();
        true
    }

    /// Poll until the model is ready, then idle until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(model = %self.model, "Readiness gate started");
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut load_requested = false;
        let mut failures = 0u32;

        while !self.current().is_ready() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.reload.notified() => {
                    tracing::info!(model = %self.model, "Model reload requested");
                    load_requested = true;
                    self.request_load().await;
                    continue;
                }
                _ = ticker.tick() => {}
            }

            let readiness = match self.backend.model_status(self.model).await {
                Ok(report) => {
                    failures = 0;
                    report.readiness()
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(
                        model = %self.model,
                        attempt = failures,
                        error = %e,
                        "Model status poll failed",
                    );
                    if failures < self.max_failures {
                        continue;
                    }
                    ModelReadiness::Error {
                        message: e.to_string(),
                    }
                }
            };

            match readiness {
                ModelReadiness::Idle if !load_requested => {
                    self.publish(ModelReadiness::Idle);
                    load_requested = true;
                    self.request_load().await;
                }
                // A model that failed and came back idle gets one more automatic load.
                ModelReadiness::Error { .. } => {
                    load_requested = false;
                    self.publish(readiness);
                }
                other => self.publish(other),
            }
        }

        if self.current().is_ready() {
            cancel.cancelled().await;
        }
        tracing::info!(model = %self.model, "Readiness gate stopped");
    }

    async fn request_load(&self) {
        match self.backend.load_model(self.model).await {
            Ok(LoadOutcome::AlreadyReady) => self.publish(ModelReadiness::Ready),
            Ok(outcome) => {
                tracing::info!(model = %self.model, ?outcome, "Model load requested");
                self.publish(ModelReadiness::Loading);
            }
            Err(e) => {
                tracing::error!(model = %self.model, error = %e, "Model load request failed");
                self.publish(ModelReadiness::Error {
                    message: e.to_string(),
                });
            }
        }
    }

    fn publish(&self, readiness: ModelReadiness) {
        let changed = self.state.send_if_modified(|current| {
            if *current == readiness {
                return false;
            }
            *current = readiness.clone();
            true
        });
        if !changed {
            return;
        }

        match &readiness {
            ModelReadiness::Ready => tracing::info!(model = %self.model, "Model ready"),
            ModelReadiness::Error { message } => {
                tracing::error!(model = %self.model, error = %message, "Model unavailable")
            }
            other => tracing::debug!(model = %self.model, state = other.label(), "Model state changed"),
        }
        let _ = self.events.send(OrchestratorEvent::ReadinessChanged { readiness });
    }
}
