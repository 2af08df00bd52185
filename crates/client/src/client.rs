//! WebSocket client for per-job progress channels.
//!
//! [`ProgressChannelClient`] holds the connection configuration for the
//! backend's push endpoint. Call [`ProgressChannelClient::connect`] to
//! establish a live [`ProgressConnection`] for one job, or use it as a
//! [`PushChannelFactory`] to get a ready-made event stream with a
//! heartbeat task attached.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, MaybeTlsStream};
use tokio_util::sync::CancellationToken;

use ccbell_core::backend::{ProgressStream, PushChannelFactory, TransportError};
use ccbell_core::types::ServerJobId;

use crate::processor::run_session;

/// Default keep-alive interval. Intermediary proxies tear down idle
/// sockets after roughly a minute.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Buffer between the session task and the stream consumer.
const EVENT_BUFFER: usize = 64;

/// Raw WebSocket stream type used by this crate.
pub type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Configuration handle for the backend's push endpoint.
#[derive(Debug, Clone)]
pub struct ProgressChannelClient {
    ws_url: String,
    heartbeat_interval: Duration,
}

/// A live WebSocket connection for one job.
pub struct ProgressConnection {
    pub job_id: ServerJobId,
    /// The raw WebSocket stream for reading/writing frames.
    pub ws_stream: WsStream,
}

impl ProgressChannelClient {
    /// * `ws_url` - WebSocket base URL, e.g. `ws://host:7860`.
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into().trim_end_matches('/').to_string(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Connect to the progress endpoint of `job_id`.
    pub async fn connect(
        &self,
        job_id: &ServerJobId,
    ) -> Result<ProgressConnection, ProgressSocketError> {
        let url = format!("{}/api/ws/{job_id}", self.ws_url);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            ProgressSocketError::Connection(format!("Failed to connect to {url}: {e}"))
        })?;

        tracing::debug!(job_id = %job_id, "Progress channel connected");

        Ok(ProgressConnection {
            job_id: job_id.clone(),
            ws_stream,
        })
    }
}

#[async_trait]
impl PushChannelFactory for ProgressChannelClient {
    async fn open(&self, job_id: &ServerJobId) -> Result<ProgressStream, TransportError> {
        let conn = self
            .connect(job_id)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();

        tokio::spawn(run_session(
            conn.ws_stream,
            conn.job_id,
            self.heartbeat_interval,
            tx,
            cancel.clone(),
        ));

        // Dropping the stream drops the guard, which stops the session
        // task and closes the socket.
        let guard = cancel.drop_guard();
        let stream = futures::stream::unfold((rx, guard), |(mut rx, guard)| async move {
            rx.recv().await.map(|item| (item, (rx, guard)))
        });

        Ok(stream.boxed())
    }
}

/// Derive the WebSocket base URL from an HTTP base URL
/// (`http` -> `ws`, `https` -> `wss`).
pub fn ws_url_from_api_url(api_url: &str) -> String {
    let api_url = api_url.trim_end_matches('/');
    if let Some(rest) = api_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = api_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        api_url.to_string()
    }
}

/// Errors that can occur when working with the WebSocket client.
#[derive(Debug, thiserror::Error)]
pub enum ProgressSocketError {
    /// Failed to establish the initial WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),
}
