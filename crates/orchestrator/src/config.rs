//! Orchestrator timing and policy settings.

use std::time::Duration;

use ccbell_core::config::{env_parse, ConfigError};
use ccbell_core::request::ModelId;

use crate::source::PollSettings;

/// Default interval between fallback status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default number of consecutive failed polls before a job is failed.
pub const DEFAULT_MAX_POLL_FAILURES: u32 = 15;

/// Default pause between a terminal event and the next dispatch.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Default interval between model status polls.
pub const DEFAULT_READINESS_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Tunables for the dispatcher, progress adapter and readiness gate.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Model the readiness gate tracks (default: `small`).
    pub model: ModelId,
    /// Fallback status poll interval (default: 2s).
    pub poll_interval: Duration,
    /// Consecutive poll failures tolerated before the job errors (default: 15).
    pub max_poll_failures: u32,
    /// Pause after a job finishes before the next one is submitted (default: 500ms).
    pub settle_delay: Duration,
    /// Model status poll interval (default: 2s).
    pub readiness_poll_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            model: ModelId::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_failures: DEFAULT_MAX_POLL_FAILURES,
            settle_delay: DEFAULT_SETTLE_DELAY,
            readiness_poll_interval: DEFAULT_READINESS_POLL_INTERVAL,
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default |
    /// |----------------------------|---------|
    /// | `CCBELL_MODEL`             | `small` |
    /// | `CCBELL_POLL_INTERVAL_MS`  | `2000`  |
    /// | `CCBELL_MAX_POLL_FAILURES` | `15`    |
    /// | `CCBELL_SETTLE_MS`         | `500`   |
    /// | `CCBELL_READINESS_POLL_MS` | `2000`  |
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(model) = env_parse::<ModelId>("CCBELL_MODEL")? {
            config.model = model;
        }
        if let Some(ms) = env_parse::<u64>("CCBELL_POLL_INTERVAL_MS")? {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(n) = env_parse::<u32>("CCBELL_MAX_POLL_FAILURES")? {
            config.max_poll_failures = n.max(1);
        }
        if let Some(ms) = env_parse::<u64>("CCBELL_SETTLE_MS")? {
            config.settle_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("CCBELL_READINESS_POLL_MS")? {
            config.readiness_poll_interval = Duration::from_millis(ms);
        }

        Ok(config)
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: self.poll_interval,
            max_failures: self.max_poll_failures,
        }
    }
}
