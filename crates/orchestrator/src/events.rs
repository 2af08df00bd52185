//! Events emitted by the orchestrator.
//!
//! These describe job lifecycle transitions for observers such as the
//! CLI's progress printer. The library store remains the source of
//! truth; events are a convenience feed and may be dropped by slow
//! subscribers.

use serde::Serialize;

use ccbell_core::readiness::ModelReadiness;
use ccbell_core::types::{JobToken, ServerJobId, SoundId};

/// Broadcast channel capacity for orchestrator events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A job-level or gate-level state change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    /// The backend accepted a job.
    JobSubmitted {
        token: JobToken,
        sound_id: SoundId,
        job_id: ServerJobId,
    },

    /// A job made progress.
    JobProgress {
        token: JobToken,
        sound_id: SoundId,
        progress: f32,
        stage: String,
    },

    /// A job finished successfully.
    JobCompleted {
        token: JobToken,
        sound_id: SoundId,
        audio_url: String,
    },

    /// A job failed, at submission or during generation.
    JobFailed {
        token: JobToken,
        sound_id: SoundId,
        error: String,
    },

    /// A job was cancelled client-side.
    JobCancelled { token: JobToken, sound_id: SoundId },

    /// The push channel for a job failed and polling took over.
    TransportFallback { job_id: ServerJobId, reason: String },

    /// The model readiness gate changed state.
    ReadinessChanged { readiness: ModelReadiness },
}

impl OrchestratorEvent {
    /// Token of the job this event concerns, if any.
    pub fn token(&self) -> Option<JobToken> {
        match self {
            Self::JobSubmitted { token, .. }
            | Self::JobProgress { token, .. }
            | Self::JobCompleted { token, .. }
            | Self::JobFailed { token, .. }
            | Self::JobCancelled { token, .. } => Some(*token),
            Self::TransportFallback { .. } | Self::ReadinessChanged { .. } => None,
        }
    }
}
