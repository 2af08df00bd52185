//! HTTP and WebSocket client for the ccbell generation backend.
//!
//! Provides the REST wrapper ([`api::GeneratorApi`]), the per-job push
//! channel ([`client::ProgressChannelClient`]) with its heartbeat-driven
//! session loop, typed message parsing, and connection settings. Both
//! clients implement the service traits from `ccbell_core::backend`.

pub mod api;
pub mod client;
pub mod config;
pub mod messages;
pub mod processor;

pub use api::GeneratorApi;
pub use client::ProgressChannelClient;
pub use config::ClientConfig;
