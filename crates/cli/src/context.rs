//! Shared dependencies for command handlers.
//!
//! Built once in `main` from environment configuration and global flags.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use ccbell_client::{ClientConfig, GeneratorApi};
use ccbell_core::request::ModelId;
use ccbell_orchestrator::{LibraryStore, Orchestrator, OrchestratorConfig};

use crate::parser::Cli;

/// Library file used when neither `--library` nor `CCBELL_LIBRARY_PATH` is set.
pub fn default_library_path() -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default();
    home.join(".ccbell").join("library.json")
}

pub struct CliContext {
    client: ClientConfig,
    orchestrator: OrchestratorConfig,
    api: GeneratorApi,
    library_path: PathBuf,
}

impl CliContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut client = ClientConfig::from_env().context("Invalid backend configuration")?;
        if let Some(api_url) = &cli.api_url {
            // Keep an explicit CCBELL_WS_URL; otherwise follow the new API URL.
            let ws_url = std::env::var("CCBELL_WS_URL").ok();
            let mut overridden = ClientConfig::for_api_url(api_url);
            overridden.heartbeat_interval = client.heartbeat_interval;
            overridden.request_timeout = client.request_timeout;
            if let Some(ws_url) = ws_url {
                overridden.ws_url = ws_url.trim_end_matches('/').to_string();
            }
            client = overridden;
        }

        let orchestrator =
            OrchestratorConfig::from_env().context("Invalid orchestrator configuration")?;
        let api = client.build_api().context("Failed to build HTTP client")?;
        let library_path = cli.library.clone().unwrap_or_else(default_library_path);

        tracing::debug!(
            api_url = %client.api_url,
            ws_url = %client.ws_url,
            library = %library_path.display(),
            "CLI context ready",
        );

        Ok(Self {
            client,
            orchestrator,
            api,
            library_path,
        })
    }

    pub fn api(&self) -> &GeneratorApi {
        &self.api
    }

    pub fn default_model(&self) -> ModelId {
        self.orchestrator.model
    }

    pub fn library_path(&self) -> &Path {
        &self.library_path
    }

    pub async fn load_library(&self) -> Result<LibraryStore> {
        LibraryStore::load(&self.library_path)
            .await
            .with_context(|| format!("Failed to load library from {}", self.library_path.display()))
    }

    pub async fn save_library(&self, library: &LibraryStore) -> Result<()> {
        library
            .save(&self.library_path)
            .await
            .with_context(|| format!("Failed to save library to {}", self.library_path.display()))
    }

    /// Orchestrator over the real backend, gating on `model`.
    pub fn orchestrator(&self, library: LibraryStore, model: ModelId) -> Orchestrator {
        let config = OrchestratorConfig {
            model,
            ..self.orchestrator.clone()
        };
        Orchestrator::new(
            Arc::new(self.api.clone()),
            Arc::new(self.client.build_channel_client()),
            library,
            config,
        )
    }
}
