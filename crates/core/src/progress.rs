//! Progress events and job status reports.
//!
//! Both transports (push channel and status polling) are translated
//! into the same [`ProgressEvent`] so consumers never need to know which
//! one produced an update.

use serde::{Deserialize, Serialize};

use crate::types::ServerJobId;

// ---------------------------------------------------------------------------
// Stage labels reported by the backend
// ---------------------------------------------------------------------------

pub const STAGE_QUEUED: &str = "queued";
pub const STAGE_LOADING_MODEL: &str = "loading_model";
pub const STAGE_PREPARING: &str = "preparing";
pub const STAGE_GENERATING: &str = "generating";
pub const STAGE_PROCESSING_AUDIO: &str = "processing_audio";
pub const STAGE_SAVING: &str = "saving";
pub const STAGE_COMPLETE: &str = "complete";
pub const STAGE_COMPLETED: &str = "completed";
pub const STAGE_ERROR: &str = "error";

/// Message used when the backend reports a failure without details.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Generation failed";

/// Message used when the backend no longer knows a job.
pub const JOB_NOT_FOUND_MESSAGE: &str = "Job not found";

// ---------------------------------------------------------------------------
// ProgressEvent
// ---------------------------------------------------------------------------

/// Non-terminal progress of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Fraction complete, in `[0, 1]`.
    pub progress: f32,
    pub stage: String,
}

impl ProgressUpdate {
    pub fn new(progress: f32, stage: impl Into<String>) -> Self {
        Self {
            progress: clamp_progress(progress),
            stage: stage.into(),
        }
    }
}

/// One observation of a job's state, from either transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressEvent {
    Progress(ProgressUpdate),
    Completed { audio_url: String },
    Failed { error: String },
}

impl ProgressEvent {
    pub fn progress(progress: f32, stage: impl Into<String>) -> Self {
        Self::Progress(ProgressUpdate::new(progress, stage))
    }

    pub fn completed(audio_url: impl Into<String>) -> Self {
        Self::Completed {
            audio_url: audio_url.into(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    /// Whether no further events follow this one.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

/// Whether a stage label marks a finished job.
pub fn is_complete_stage(stage: &str) -> bool {
    stage == STAGE_COMPLETE || stage == STAGE_COMPLETED
}

/// Download path of a finished job's audio.
///
/// The backend omits `audio_url` from some completion reports; the file
/// is always served from this path.
pub fn audio_path(job_id: &ServerJobId) -> String {
    format!("/api/audio/{job_id}")
}

/// Clamp a reported progress value into `[0, 1]`, mapping NaN to 0.
pub fn clamp_progress(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Pull-based status
// ---------------------------------------------------------------------------

/// Job status as reported by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteJobStatus {
    Queued,
    Processing,
    /// The backend uses both `complete` and `completed`.
    #[serde(alias = "completed")]
    Complete,
    Error,
}

/// Response body of the job status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusReport {
    pub status: RemoteJobStatus,
    #[serde(default)]
    pub progress: f32,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl JobStatusReport {
    /// Translate a polled status into the transport-independent event.
    ///
    /// A finished job without an `audio_url` completes with the job's
    /// download path.
    pub fn into_event(self, job_id: &ServerJobId) -> ProgressEvent {
        let finished = self.status == RemoteJobStatus::Complete
            || self.stage.as_deref().is_some_and(is_complete_stage);
        match self.status {
            RemoteJobStatus::Error => {
                ProgressEvent::failed(self.error.unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.into()))
            }
            _ if finished => {
                ProgressEvent::completed(self.audio_url.unwrap_or_else(|| audio_path(job_id)))
            }
            status => {
                let stage = self.stage.unwrap_or_else(|| match status {
                    RemoteJobStatus::Queued => STAGE_QUEUED.into(),
                    _ => STAGE_GENERATING.into(),
                });
                ProgressEvent::progress(self.progress, stage)
            }
        }
    }
}
