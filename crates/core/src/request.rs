//! Generation requests and their validation.
//!
//! A [`GenerationRequest`] is created by the caller at enqueue time and
//! never mutated afterwards. Validation mirrors the limits the backend
//! enforces so that an obviously bad request is rejected locally
//! instead of producing a library entry that immediately errors.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum prompt length in characters.
pub const MAX_PROMPT_LENGTH: usize = 500;

/// Shortest clip the backend will generate, in seconds.
pub const MIN_DURATION_SECS: f32 = 0.5;

/// Longest clip the small model can generate, in seconds.
pub const MAX_DURATION_SMALL_SECS: f32 = 11.0;

/// Longest clip the full model can generate, in seconds.
pub const MAX_DURATION_LARGE_SECS: f32 = 47.0;

/// Default clip duration, in seconds.
pub const DEFAULT_DURATION_SECS: f32 = 2.0;

/// Valid range for diffusion steps.
pub const MIN_STEPS: u32 = 1;
pub const MAX_STEPS: u32 = 200;

/// Valid range for the classifier-free guidance scale.
pub const MIN_CFG_SCALE: f32 = 0.0;
pub const MAX_CFG_SCALE: f32 = 15.0;

// ---------------------------------------------------------------------------
// ModelId
// ---------------------------------------------------------------------------

/// Inference model served by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelId {
    /// Fast, CPU-friendly model.
    #[default]
    #[serde(rename = "small")]
    Small,
    /// Full-size model.
    #[serde(rename = "1.0")]
    Large,
}

impl ModelId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Large => "1.0",
        }
    }

    /// Longest clip this model accepts, in seconds.
    pub fn max_duration_secs(&self) -> f32 {
        match self {
            Self::Small => MAX_DURATION_SMALL_SECS,
            Self::Large => MAX_DURATION_LARGE_SECS,
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ModelId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "small" => Ok(Self::Small),
            "1.0" | "large" => Ok(Self::Large),
            other => Err(CoreError::Validation(format!(
                "Unknown model '{other}'. Must be one of: small, 1.0"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Optional tuning parameters. Unset fields use the model's defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cfg_scale: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampler: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

/// One unit of generation work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub model: ModelId,
    pub prompt: String,
    /// Hook the sound is meant for (e.g. `Stop`, `Notification`).
    pub hook_type: String,
    /// Target clip length in seconds.
    pub duration: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<GenerationSettings>,
}

impl GenerationRequest {
    pub fn new(model: ModelId, prompt: impl Into<String>, hook_type: impl Into<String>) -> Self {
        Self {
            model,
            prompt: prompt.into(),
            hook_type: hook_type.into(),
            duration: DEFAULT_DURATION_SECS,
            settings: None,
        }
    }

    pub fn with_duration(mut self, duration: f32) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Check the request against the backend's limits.
    pub fn validate(&self) -> Result<(), CoreError> {
        let prompt_len = self.prompt.trim().chars().count();
        if prompt_len == 0 {
            return Err(CoreError::Validation("Prompt must not be empty".into()));
        }
        if prompt_len > MAX_PROMPT_LENGTH {
            return Err(CoreError::Validation(format!(
                "Prompt is {prompt_len} characters; the limit is {MAX_PROMPT_LENGTH}"
            )));
        }

        if self.hook_type.trim().is_empty() {
            return Err(CoreError::Validation("Hook type must not be empty".into()));
        }

        let max_duration = self.model.max_duration_secs();
        if !(MIN_DURATION_SECS..=max_duration).contains(&self.duration) {
            return Err(CoreError::Validation(format!(
                "Duration {}s is outside {MIN_DURATION_SECS}..={max_duration}s for model {}",
                self.duration, self.model
            )));
        }

        if let Some(settings) = &self.settings {
            if let Some(steps) = settings.steps {
                if !(MIN_STEPS..=MAX_STEPS).contains(&steps) {
                    return Err(CoreError::Validation(format!(
                        "Steps must be between {MIN_STEPS} and {MAX_STEPS}, got {steps}"
                    )));
                }
            }
            if let Some(cfg) = settings.cfg_scale {
                if !(MIN_CFG_SCALE..=MAX_CFG_SCALE).contains(&cfg) {
                    return Err(CoreError::Validation(format!(
                        "CFG scale must be between {MIN_CFG_SCALE} and {MAX_CFG_SCALE}, got {cfg}"
                    )));
                }
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
