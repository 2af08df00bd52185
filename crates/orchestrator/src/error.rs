use ccbell_core::CoreError;

/// Errors surfaced by the orchestrator's public API.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Library file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Library file is malformed: {0}")]
    Serde(#[from] serde_json::Error),
}
