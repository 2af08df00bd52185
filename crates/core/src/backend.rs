//! External service seams consumed by the orchestrator.
//!
//! [`GenerationBackend`] covers the request/response endpoints (submit,
//! status, delete, model status, model load). [`PushChannelFactory`]
//! opens the live progress channel for one job. The HTTP client crate
//! implements both against a real backend; tests implement them with
//! scripted fakes.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::progress::{JobStatusReport, ProgressEvent};
use crate::readiness::{LoadOutcome, ModelStatusReport};
use crate::request::{GenerationRequest, ModelId};
use crate::types::ServerJobId;

/// Live events for one job. Ends after a terminal event, or yields an
/// `Err` when the transport fails.
pub type ProgressStream = BoxStream<'static, Result<ProgressEvent, TransportError>>;

/// Request/response endpoints of the generation backend.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Submit one request. Returns the server-assigned job id.
    async fn submit(&self, request: &GenerationRequest) -> Result<ServerJobId, BackendError>;

    /// Pull-based status of a job.
    async fn job_status(&self, job_id: &ServerJobId) -> Result<JobStatusReport, BackendError>;

    /// Delete server-side artifacts of a finished job.
    async fn delete_job(&self, job_id: &ServerJobId) -> Result<(), BackendError>;

    /// Loading state of a model.
    async fn model_status(&self, model: ModelId) -> Result<ModelStatusReport, BackendError>;

    /// Ask the backend to start loading a model.
    async fn load_model(&self, model: ModelId) -> Result<LoadOutcome, BackendError>;
}

/// Opens push-based progress channels.
#[async_trait]
pub trait PushChannelFactory: Send + Sync {
    /// Open the channel for `job_id`. An `Err` means the channel could
    /// not be established at all.
    async fn open(&self, job_id: &ServerJobId) -> Result<ProgressStream, TransportError>;
}

/// Errors from the request/response endpoints.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    /// The request never produced a response (network, DNS, TLS, timeout).
    #[error("Request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status.
    #[error("Backend error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The addressed job or model does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The response body could not be decoded.
    #[error("Malformed response: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Failures of a progress transport. Never surfaced as job failures by
/// themselves; they trigger the fallback to polling.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to open progress channel: {0}")]
    Connect(String),

    #[error("Progress channel closed before the job finished")]
    Closed,

    #[error("Progress channel receive error: {0}")]
    Receive(String),

    #[error("Heartbeat failed: {0}")]
    Heartbeat(String),

    #[error("Progress channel protocol error: {0}")]
    Protocol(String),

    #[error("Status polling gave up after {attempts} consecutive failures: {last_error}")]
    PollExhausted { attempts: u32, last_error: String },
}
