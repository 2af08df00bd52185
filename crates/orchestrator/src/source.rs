//! Progress sources.
//!
//! A [`ProgressSource`] yields the [`ProgressEvent`]s of one server job.
//! [`PushSource`] reads the live channel opened by a
//! [`PushChannelFactory`](ccbell_core::backend::PushChannelFactory);
//! [`PollSource`] asks the status endpoint at a fixed interval. Both share
//! the same contract so the adapter above them can swap one for the other.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::time::{Interval, MissedTickBehavior};

use ccbell_core::backend::{GenerationBackend, ProgressStream, TransportError};
use ccbell_core::progress::{ProgressEvent, JOB_NOT_FOUND_MESSAGE};
use ccbell_core::types::ServerJobId;

/// Which transport a source uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Push,
    Polling,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push => f.write_str("push"),
            Self::Polling => f.write_str("polling"),
        }
    }
}

/// A transport-agnostic feed of job events.
#[async_trait]
pub trait ProgressSource: Send {
    /// Wait for the next event.
    ///
    /// An `Err` means the transport itself failed; it says nothing about
    /// the job.
    async fn next_event(&mut self) -> Result<ProgressEvent, TransportError>;

    fn kind(&self) -> TransportKind;
}

// ---------------------------------------------------------------------------
// Push
// ---------------------------------------------------------------------------

/// Reads events from an open push channel. Dropping it closes the channel.
pub struct PushSource {
    stream: ProgressStream,
}

impl PushSource {
    pub fn new(stream: ProgressStream) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl ProgressSource for PushSource {
    async fn next_event(&mut self) -> Result<ProgressEvent, TransportError> {
        self.stream
            .next()
            .await
            .unwrap_or(Err(TransportError::Closed))
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Push
    }
}

// ---------------------------------------------------------------------------
// Poll
// ---------------------------------------------------------------------------

/// Status polling cadence and tolerance.
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    /// Consecutive failed polls tolerated before giving up.
    pub max_failures: u32,
}

/// Polls the job status endpoint.
///
/// The first poll happens immediately. Individual request failures are
/// absorbed until `max_failures` happen in a row. An unknown job is a
/// terminal failure of the job, not of the transport.
pub struct PollSource {
    backend: Arc<dyn GenerationBackend>,
    job_id: ServerJobId,
    ticker: Interval,
    max_failures: u32,
    failures: u32,
}

impl PollSource {
    pub fn new(backend: Arc<dyn GenerationBackend>, job_id: ServerJobId, settings: PollSettings) -> Self {
        let mut ticker = tokio::time::interval(settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            backend,
            job_id,
            ticker,
            max_failures: settings.max_failures.max(1),
            failures: 0,
        }
    }
}

#[async_trait]
impl ProgressSource for PollSource {
    async fn next_event(&mut self) -> Result<ProgressEvent, TransportError> {
        loop {
            self.ticker.tick().await;

            match self.backend.job_status(&self.job_id).await {
                Ok(report) => {
                    self.failures = 0;
                    return Ok(report.into_event(&self.job_id));
                }
                Err(e) if e.is_not_found() => {
                    tracing::warn!(job_id = %self.job_id, "Job unknown to backend");
                    return Ok(ProgressEvent::failed(JOB_NOT_FOUND_MESSAGE));
                }
                Err(e) => {
                    self.failures += 1;
                    tracing::warn!(
                        job_id = %self.job_id,
                        attempt = self.failures,
                        max = self.max_failures,
                        error = %e,
                        "Status poll failed",
                    );
                    if self.failures >= self.max_failures {
                        return Err(TransportError::PollExhausted {
                            attempts: self.failures,
                            last_error: e.to_string(),
                        });
                    }
                }
            }
        }
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Polling
    }
}
