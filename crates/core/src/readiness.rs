//! Model readiness states.
//!
//! The backend loads its inference model lazily. Until the selected
//! model reports `ready`, the first job of a session must not be
//! submitted.

use serde::{Deserialize, Serialize};

use crate::request::ModelId;

/// Loading state of a backend model.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModelReadiness {
    /// Not yet observed.
    #[default]
    Unknown,
    Idle,
    Loading,
    Ready,
    Error { message: String },
}

impl ModelReadiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Error { .. } => "error",
        }
    }
}

/// Wire status of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteModelStatus {
    Idle,
    Loading,
    Ready,
    Error,
}

/// Response body of the model status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatusReport {
    pub model_id: ModelId,
    pub status: RemoteModelStatus,
    #[serde(default)]
    pub progress: f32,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ModelStatusReport {
    pub fn readiness(&self) -> ModelReadiness {
        match self.status {
            RemoteModelStatus::Idle => ModelReadiness::Idle,
            RemoteModelStatus::Loading => ModelReadiness::Loading,
            RemoteModelStatus::Ready => ModelReadiness::Ready,
            RemoteModelStatus::Error => ModelReadiness::Error {
                message: self
                    .error
                    .clone()
                    .unwrap_or_else(|| format!("Model {} failed to load", self.model_id)),
            },
        }
    }
}

/// Response of a load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadOutcome {
    LoadingStarted,
    AlreadyLoading,
    AlreadyReady,
}
