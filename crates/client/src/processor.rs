//! Push channel session loop.
//!
//! Reads frames from one job's WebSocket, forwards decoded events to the
//! consumer, and sends a heartbeat on a timer. The loop ends on the
//! first terminal event, on cancellation, or on a transport failure,
//! which is forwarded as the final `Err` item.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use ccbell_core::backend::TransportError;
use ccbell_core::progress::ProgressEvent;
use ccbell_core::types::ServerJobId;

use crate::client::WsStream;
use crate::messages::{parse_message, ChannelMessage, HEARTBEAT_PING};

/// Upper bound on the closing handshake.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type EventSender = mpsc::Sender<Result<ProgressEvent, TransportError>>;

/// Drive a single progress channel until it finishes.
pub async fn run_session(
    ws_stream: WsStream,
    job_id: ServerJobId,
    heartbeat: Duration,
    tx: EventSender,
    cancel: CancellationToken,
) {
    let (mut sink, mut stream) = ws_stream.split();
    let mut ticker = interval_at(Instant::now() + heartbeat, heartbeat);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let failure = loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(job_id = %job_id, "Progress channel cancelled");
                break None;
            }
            _ = ticker.tick() => {
                tracing::trace!(job_id = %job_id, "Progress channel heartbeat");
                if let Err(e) = sink.send(Message::Text(HEARTBEAT_PING.to_string())).await {
                    break Some(TransportError::Heartbeat(e.to_string()));
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let Some(event) = decode_frame(&text, &job_id) else {
                            continue;
                        };
                        let terminal = event.is_terminal();
                        if tx.send(Ok(event)).await.is_err() || terminal {
                            break None;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::debug!(job_id = %job_id, ?frame, "Progress channel closed by backend");
                        break Some(TransportError::Closed);
                    }
                    Some(Ok(_)) => {
                        // Ping/Pong are handled by tungstenite; binary frames carry nothing for us.
                    }
                    Some(Err(e)) => break Some(TransportError::Receive(e.to_string())),
                    None => break Some(TransportError::Closed),
                }
            }
        }
    };

    if let Some(err) = failure {
        tracing::debug!(job_id = %job_id, error = %err, "Progress channel failed");
        let _ = tx.send(Err(err)).await;
    }

    let _ = tokio::time::timeout(CLOSE_TIMEOUT, sink.send(Message::Close(None))).await;
}

/// Decode one text frame. Heartbeat answers and malformed frames yield `None`.
fn decode_frame(text: &str, job_id: &ServerJobId) -> Option<ProgressEvent> {
    match parse_message(text) {
        Ok(ChannelMessage::Pong) => None,
        Ok(ChannelMessage::Frame(frame)) => {
            let event = frame.into_event(job_id);
            tracing::trace!(job_id = %job_id, ?event, "Progress frame");
            Some(event)
        }
        Err(e) => {
            tracing::warn!(
                job_id = %job_id,
                error = %e,
                raw_message = %text,
                "Failed to parse progress frame",
            );
            None
        }
    }
}
