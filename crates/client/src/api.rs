//! REST API client for the generation backend.
//!
//! Wraps job submission, status polling, artifact deletion and
//! download, model readiness, and the theme/hook catalogs using
//! [`reqwest`].

use async_trait::async_trait;
use serde::Deserialize;

use ccbell_core::backend::{BackendError, GenerationBackend};
use ccbell_core::catalog::{HookType, ThemePreset};
use ccbell_core::progress::JobStatusReport;
use ccbell_core::readiness::{LoadOutcome, ModelStatusReport};
use ccbell_core::request::{GenerationRequest, ModelId};
use ccbell_core::types::ServerJobId;

/// HTTP client for one generation backend.
#[derive(Clone)]
pub struct GeneratorApi {
    client: reqwest::Client,
    api_url: String,
}

/// Response returned by `POST /api/generate`.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned job identifier.
    pub job_id: String,
    pub status: String,
}

/// Response returned by `POST /api/models/{id}/load`.
#[derive(Debug, Deserialize)]
pub struct LoadResponse {
    pub status: LoadOutcome,
    pub model_id: String,
}

/// Response returned by `GET /api/health`.
#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    #[serde(default)]
    pub models_loaded: Vec<String>,
}

/// Errors from the REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Backend API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl From<GeneratorApiError> for BackendError {
    fn from(err: GeneratorApiError) -> Self {
        match err {
            GeneratorApiError::ApiError { status: 404, body } => BackendError::NotFound(body),
            GeneratorApiError::ApiError { status, body } => BackendError::Api { status, body },
            GeneratorApiError::Request(e) if e.is_decode() => BackendError::Decode(e.to_string()),
            GeneratorApiError::Request(e) => BackendError::Request(e.to_string()),
        }
    }
}

impl GeneratorApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:7860`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (e.g. one built with a request timeout).
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Turn a backend-relative audio reference (`/api/audio/{id}`) into
    /// an absolute URL. Absolute URLs are returned unchanged.
    pub fn resolve_url(&self, reference: &str) -> String {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            reference.to_string()
        } else {
            format!("{}/{}", self.api_url, reference.trim_start_matches('/'))
        }
    }

    /// Submit a generation request (`POST /api/generate`).
    pub async fn submit(
        &self,
        request: &GenerationRequest,
    ) -> Result<SubmitResponse, GeneratorApiError> {
        let response = self
            .client
            .post(format!("{}/api/generate", self.api_url))
            .json(request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the status of a job (`GET /api/audio/{job_id}/status`).
    pub async fn job_status(&self, job_id: &str) -> Result<JobStatusReport, GeneratorApiError> {
        let response = self
            .client
            .get(format!("{}/api/audio/{job_id}/status", self.api_url))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Delete a job and its audio file (`DELETE /api/audio/{job_id}`).
    pub async fn delete_job(&self, job_id: &str) -> Result<(), GeneratorApiError> {
        let response = self
            .client
            .delete(format!("{}/api/audio/{job_id}", self.api_url))
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Download the WAV bytes behind an audio reference.
    pub async fn fetch_audio(&self, audio_url: &str) -> Result<Vec<u8>, GeneratorApiError> {
        let response = self.client.get(self.resolve_url(audio_url)).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Loading state of a model (`GET /api/models/{id}/status`).
    pub async fn model_status(
        &self,
        model: ModelId,
    ) -> Result<ModelStatusReport, GeneratorApiError> {
        let response = self
            .client
            .get(format!("{}/api/models/{model}/status", self.api_url))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Trigger background loading of a model (`POST /api/models/{id}/load`).
    pub async fn load_model(&self, model: ModelId) -> Result<LoadResponse, GeneratorApiError> {
        let response = self
            .client
            .post(format!("{}/api/models/{model}/load", self.api_url))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Theme presets (`GET /api/themes`).
    pub async fn themes(&self) -> Result<Vec<ThemePreset>, GeneratorApiError> {
        let response = self
            .client
            .get(format!("{}/api/themes", self.api_url))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Hook types (`GET /api/hooks`).
    pub async fn hooks(&self) -> Result<Vec<HookType>, GeneratorApiError> {
        let response = self
            .client
            .get(format!("{}/api/hooks", self.api_url))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Backend health (`GET /api/health`).
    pub async fn health(&self) -> Result<HealthResponse, GeneratorApiError> {
        let response = self
            .client
            .get(format!("{}/api/health", self.api_url))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`GeneratorApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, GeneratorApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GeneratorApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GeneratorApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), GeneratorApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl GenerationBackend for GeneratorApi {
    async fn submit(&self, request: &GenerationRequest) -> Result<ServerJobId, BackendError> {
        let response = GeneratorApi::submit(self, request).await?;
        Ok(ServerJobId::new(response.job_id))
    }

    async fn job_status(&self, job_id: &ServerJobId) -> Result<JobStatusReport, BackendError> {
        Ok(GeneratorApi::job_status(self, job_id.as_str()).await?)
    }

    async fn delete_job(&self, job_id: &ServerJobId) -> Result<(), BackendError> {
        match GeneratorApi::delete_job(self, job_id.as_str()).await {
            // Already gone server-side.
            Err(GeneratorApiError::ApiError { status: 404, .. }) => Ok(()),
            other => Ok(other?),
        }
    }

    async fn model_status(&self, model: ModelId) -> Result<ModelStatusReport, BackendError> {
        Ok(GeneratorApi::model_status(self, model).await?)
    }

    async fn load_model(&self, model: ModelId) -> Result<LoadOutcome, BackendError> {
        let response = GeneratorApi::load_model(self, model).await?;
        Ok(response.status)
    }
}
