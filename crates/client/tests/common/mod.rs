//! In-process fake of the generation backend.
//!
//! Serves the REST routes and the per-job WebSocket on an ephemeral
//! port. The job id selects the push channel's behaviour:
//!
//! - `job-ok`: three progress frames, then the completion frame.
//! - `job-fail`: one progress frame, then an error frame.
//! - `job-drop`: one progress frame, then the socket is closed.
//! - `job-heartbeat`: waits for a `ping`, answers `pong`, then completes.
//! - `job-done`: an already finished job. Sends one `complete` frame
//!   without an `audio_url` and keeps the socket open.
//!
//! Status reports for finished jobs carry `audio_url: null`, as the
//! real backend does.

use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use futures::SinkExt;

/// Start the fake backend and return its base address.
pub async fn spawn_backend() -> SocketAddr {
    let app = Router::new()
        .route("/api/generate", post(generate))
        .route("/api/audio/{job_id}/status", get(job_status))
        .route("/api/audio/{job_id}", get(audio).delete(delete_job))
        .route("/api/models/{model_id}/status", get(model_status))
        .route("/api/models/{model_id}/load", post(load_model))
        .route("/api/themes", get(themes))
        .route("/api/hooks", get(hooks))
        .route("/api/health", get(health))
        .route("/api/ws/{job_id}", get(ws_handler));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake backend");
    });
    addr
}

async fn generate(Json(body): Json<serde_json::Value>) -> Response {
    if body["prompt"] == "reject me" {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"detail": "prompt rejected"})),
        )
            .into_response();
    }
    Json(json!({"job_id": "job-ok", "status": "queued"})).into_response()
}

async fn job_status(Path(job_id): Path<String>) -> Response {
    match job_id.as_str() {
        "job-ok" => Json(json!({
            "job_id": job_id,
            "status": "complete",
            "progress": 1.0,
            "stage": "complete",
            "audio_url": null,
            "error": null,
        }))
        .into_response(),
        "job-running" => Json(json!({
            "job_id": job_id,
            "status": "processing",
            "progress": 0.3,
            "stage": "generating",
        }))
        .into_response(),
        _ => not_found(),
    }
}

async fn audio(Path(job_id): Path<String>) -> Response {
    if job_id == "job-ok" {
        (StatusCode::OK, b"RIFF....WAVE".to_vec()).into_response()
    } else {
        not_found()
    }
}

async fn delete_job(Path(job_id): Path<String>) -> Response {
    if job_id == "job-ok" {
        Json(json!({"status": "deleted", "job_id": job_id})).into_response()
    } else {
        not_found()
    }
}

async fn model_status(Path(model_id): Path<String>) -> Response {
    Json(json!({
        "model_id": model_id,
        "status": "ready",
        "progress": 1.0,
        "stage": "ready",
    }))
    .into_response()
}

async fn load_model(Path(model_id): Path<String>) -> Response {
    Json(json!({"status": "already_ready", "model_id": model_id})).into_response()
}

async fn themes() -> Response {
    Json(json!([{
        "id": "minimal",
        "name": "Minimal",
        "description": "Clean, subtle sounds",
        "prompt_template": "Minimal {sound_type}, clean tone",
        "icon": "circle",
    }]))
    .into_response()
}

async fn hooks() -> Response {
    Json(json!([{
        "id": "Stop",
        "name": "Stop",
        "description": "Main agent has finished its task",
        "sound_character": "Satisfying completion tone",
        "suggested_duration": 1.5,
    }]))
    .into_response()
}

async fn health() -> Response {
    Json(json!({"status": "healthy", "version": "1.0.0", "models_loaded": ["small"]}))
        .into_response()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"detail": "Job not found"}))).into_response()
}

async fn ws_handler(ws: WebSocketUpgrade, Path(job_id): Path<String>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, job_id))
}

async fn handle_socket(mut socket: WebSocket, job_id: String) {
    match job_id.as_str() {
        "job-ok" => {
            for (progress, stage) in [(0.05, "loading_model"), (0.3, "generating"), (0.9, "saving")] {
                let frame = json!({"progress": progress, "stage": stage}).to_string();
                if socket.send(Message::Text(frame.into())).await.is_err() {
                    return;
                }
            }
            let done = json!({"progress": 1.0, "stage": "complete", "audio_url": "/api/audio/job-ok"});
            let _ = socket.send(Message::Text(done.to_string().into())).await;
            let _ = socket.close().await;
        }
        "job-fail" => {
            let frame = json!({"progress": 0.2, "stage": "preparing"}).to_string();
            let _ = socket.send(Message::Text(frame.into())).await;
            let err = json!({"progress": 0, "stage": "error", "error": "CUDA out of memory"});
            let _ = socket.send(Message::Text(err.to_string().into())).await;
            let _ = socket.close().await;
        }
        "job-drop" => {
            let frame = json!({"progress": 0.2, "stage": "preparing"}).to_string();
            let _ = socket.send(Message::Text(frame.into())).await;
            let _ = socket.close().await;
        }
        "job-heartbeat" => {
            while let Some(Ok(msg)) = socket.recv().await {
                if let Message::Text(text) = msg {
                    if text.as_str() == "ping" {
                        let _ = socket.send(Message::Text("pong".into())).await;
                        let done = json!({"progress": 1.0, "stage": "complete", "audio_url": "/api/audio/job-heartbeat"});
                        let _ = socket.send(Message::Text(done.to_string().into())).await;
                        break;
                    }
                }
            }
            let _ = socket.close().await;
        }
        "job-done" => {
            let frame = json!({"progress": 1.0, "stage": "complete"}).to_string();
            if socket.send(Message::Text(frame.into())).await.is_err() {
                return;
            }
            while let Some(Ok(_)) = socket.recv().await {}
        }
        _ => {
            let err = json!({"error": "Job not found", "progress": 0, "stage": "error"});
            let _ = socket.send(Message::Text(err.to_string().into())).await;
            let _ = socket.close().await;
        }
    }
}
