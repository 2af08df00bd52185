//! Domain types shared by the ccbell client, orchestrator and CLI.
//!
//! Nothing in this crate performs I/O. The service seams the
//! orchestrator consumes ([`backend::GenerationBackend`] and
//! [`backend::PushChannelFactory`]) are declared here so that the
//! HTTP client and test fakes can implement them without depending on
//! the orchestrator itself.

pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod job;
pub mod progress;
pub mod readiness;
pub mod request;
pub mod sound;
pub mod types;

pub use error::CoreError;
