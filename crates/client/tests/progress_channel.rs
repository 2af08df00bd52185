//! Integration tests for the push progress channel against the fake
//! backend's WebSocket endpoint.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use futures::StreamExt;

use ccbell_client::client::ProgressChannelClient;
use ccbell_core::backend::{PushChannelFactory, TransportError};
use ccbell_core::progress::ProgressEvent;
use ccbell_core::types::ServerJobId;

async fn client() -> ProgressChannelClient {
    let addr = common::spawn_backend().await;
    ProgressChannelClient::new(format!("ws://{addr}"))
}

#[tokio::test]
async fn streams_progress_then_completion_and_ends() {
    let client = client().await;
    let mut stream = client.open(&ServerJobId::new("job-ok")).await.unwrap();

    let mut events = Vec::new();
    while let Some(item) = stream.next().await {
        events.push(item.unwrap());
    }

    assert_eq!(
        events,
        vec![
            ProgressEvent::progress(0.05, "loading_model"),
            ProgressEvent::progress(0.3, "generating"),
            ProgressEvent::progress(0.9, "saving"),
            ProgressEvent::completed("/api/audio/job-ok"),
        ]
    );
}

#[tokio::test]
async fn error_frame_is_failure_terminal() {
    let client = client().await;
    let mut stream = client.open(&ServerJobId::new("job-fail")).await.unwrap();

    assert_eq!(
        stream.next().await.unwrap().unwrap(),
        ProgressEvent::progress(0.2, "preparing")
    );
    assert_eq!(
        stream.next().await.unwrap().unwrap(),
        ProgressEvent::failed("CUDA out of memory")
    );
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn close_before_terminal_is_transport_error() {
    let client = client().await;
    let mut stream = client.open(&ServerJobId::new("job-drop")).await.unwrap();

    assert_eq!(
        stream.next().await.unwrap().unwrap(),
        ProgressEvent::progress(0.2, "preparing")
    );
    assert_matches!(
        stream.next().await,
        Some(Err(TransportError::Closed | TransportError::Receive(_)))
    );
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn heartbeat_ping_is_sent_and_pong_ignored() {
    let client = client()
        .await
        .with_heartbeat_interval(Duration::from_millis(50));
    let mut stream = client
        .open(&ServerJobId::new("job-heartbeat"))
        .await
        .unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("completion should arrive after the first heartbeat");

    assert_eq!(
        first.unwrap().unwrap(),
        ProgressEvent::completed("/api/audio/job-heartbeat")
    );
}

#[tokio::test]
async fn finished_job_completes_from_stage_alone() {
    let client = client().await;
    let mut stream = client.open(&ServerJobId::new("job-done")).await.unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("a complete frame is terminal");

    assert_eq!(
        first.unwrap().unwrap(),
        ProgressEvent::completed("/api/audio/job-done")
    );
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn unknown_job_reports_failure() {
    let client = client().await;
    let mut stream = client.open(&ServerJobId::new("nope")).await.unwrap();

    assert_eq!(
        stream.next().await.unwrap().unwrap(),
        ProgressEvent::failed("Job not found")
    );
}
