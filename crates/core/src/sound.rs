//! Library entries and packs.
//!
//! A [`GeneratedSound`] is created the moment a request is accepted into
//! the queue and is finalized exactly once. Status only ever moves
//! forward: `generating -> completed | error`. The transition helpers
//! below refuse to touch an entry that has already reached a terminal
//! state, which is what makes duplicate terminal events harmless.

use serde::{Deserialize, Serialize};

use crate::progress::{clamp_progress, STAGE_COMPLETE, STAGE_ERROR, STAGE_QUEUED};
use crate::request::{GenerationRequest, ModelId};
use crate::types::{PackId, ServerJobId, SoundId, Timestamp};

/// Lifecycle status of a library entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundStatus {
    Generating,
    Completed,
    Error,
}

impl SoundStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Generating)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

/// The durable, user-facing record of one generated clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedSound {
    pub id: SoundId,
    /// Empty until dispatch starts.
    pub job_id: Option<ServerJobId>,
    pub pack_id: PackId,
    pub hook_type: String,
    pub prompt: String,
    pub model: ModelId,
    pub duration: f32,
    /// Empty until completion.
    pub audio_url: Option<String>,
    pub status: SoundStatus,
    pub progress: f32,
    pub stage: String,
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
}

impl GeneratedSound {
    /// A fresh `generating` entry for a request that was just queued.
    pub fn pending(pack_id: PackId, request: &GenerationRequest) -> Self {
        Self {
            id: SoundId::new(),
            job_id: None,
            pack_id,
            hook_type: request.hook_type.clone(),
            prompt: request.prompt.clone(),
            model: request.model,
            duration: request.duration,
            audio_url: None,
            status: SoundStatus::Generating,
            progress: 0.0,
            stage: STAGE_QUEUED.into(),
            error: None,
            created_at: chrono::Utc::now(),
            started_at: None,
        }
    }

    /// Record the server job id once submission succeeded.
    pub fn mark_started(&mut self, job_id: ServerJobId) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.job_id = Some(job_id);
        self.started_at = Some(chrono::Utc::now());
        true
    }

    /// Apply a progress update. Progress never moves backwards.
    pub fn apply_progress(&mut self, progress: f32, stage: &str) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.progress = self.progress.max(clamp_progress(progress));
        self.stage = stage.to_string();
        true
    }

    pub fn complete(&mut self, audio_url: String) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = SoundStatus::Completed;
        self.progress = 1.0;
        self.stage = STAGE_COMPLETE.into();
        self.audio_url = Some(audio_url);
        true
    }

    pub fn fail(&mut self, error: String) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = SoundStatus::Error;
        self.stage = STAGE_ERROR.into();
        self.error = Some(error);
        true
    }
}

/// A named grouping of sounds produced by one generation batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundPack {
    pub id: PackId,
    pub name: String,
    /// Theme preset the pack was generated from, if any.
    pub theme: Option<String>,
    pub model: ModelId,
    pub created_at: Timestamp,
}

impl SoundPack {
    pub fn new(name: impl Into<String>, theme: Option<String>, model: ModelId) -> Self {
        Self {
            id: PackId::new(),
            name: name.into(),
            theme,
            model,
            created_at: chrono::Utc::now(),
        }
    }
}
