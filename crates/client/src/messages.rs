//! Push channel message types and parser.
//!
//! The backend sends JSON text frames shaped like
//! `{"progress": 0.3, "stage": "generating"}`. The final frame carries
//! either an `audio_url` or a `complete` stage (success), or
//! `stage == "error"` / an `error` field (failure). The text frame
//! `pong` answers our heartbeat.

use serde::Deserialize;

use ccbell_core::progress::{
    audio_path, is_complete_stage, ProgressEvent, DEFAULT_FAILURE_MESSAGE, STAGE_ERROR,
    STAGE_GENERATING,
};
use ccbell_core::types::ServerJobId;

/// Heartbeat payload sent by the client.
pub const HEARTBEAT_PING: &str = "ping";

/// Heartbeat answer sent by the backend.
pub const HEARTBEAT_PONG: &str = "pong";

/// One decoded text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMessage {
    /// Heartbeat answer; carries no job information.
    Pong,
    Frame(ProgressFrame),
}

/// Payload of a progress frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProgressFrame {
    #[serde(default)]
    pub progress: f32,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ProgressFrame {
    /// Translate the frame into a transport-independent event.
    ///
    /// A frame for an already finished job may carry only the `complete`
    /// stage; it completes with the job's download path.
    pub fn into_event(self, job_id: &ServerJobId) -> ProgressEvent {
        let is_error = self.error.is_some() || self.stage.as_deref() == Some(STAGE_ERROR);
        if is_error {
            return ProgressEvent::failed(
                self.error.unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string()),
            );
        }
        if let Some(url) = self.audio_url {
            return ProgressEvent::completed(url);
        }
        if self.stage.as_deref().is_some_and(is_complete_stage) {
            return ProgressEvent::completed(audio_path(job_id));
        }
        ProgressEvent::progress(
            self.progress,
            self.stage.unwrap_or_else(|| STAGE_GENERATING.to_string()),
        )
    }
}

/// Parse a text frame from the push channel.
///
/// Returns `Err` for malformed JSON. Callers should log and continue.
pub fn parse_message(text: &str) -> Result<ChannelMessage, serde_json::Error> {
    if text.trim() == HEARTBEAT_PONG {
        return Ok(ChannelMessage::Pong);
    }
    serde_json::from_str(text).map(ChannelMessage::Frame)
}
