//! Client-side generation job orchestrator.
//!
//! Accepts any number of generation requests, runs them one at a time
//! against the backend, follows each job over the push channel (falling
//! back to status polling when it fails), and reconciles every outcome
//! into the sound library.
//!
//! - [`queue::JobQueue`]: FIFO of pending jobs.
//! - [`channel::ProgressChannel`]: push-then-poll progress adapter.
//! - [`dispatcher::Dispatcher`]: the sequential `Idle/Submitting/Active/Draining` loop.
//! - [`reconciler::Reconciler`] and [`library::LibraryStore`]: outcomes to entries.
//! - [`readiness::ReadinessGate`]: model status poller with auto-load.
//! - [`Orchestrator`]: the container wiring them together.

pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod library;
pub mod orchestrator;
pub mod queue;
pub mod readiness;
pub mod reconciler;
pub mod source;

pub use config::OrchestratorConfig;
pub use error::OrchestratorError;
pub use events::OrchestratorEvent;
pub use library::{Library, LibraryStore};
pub use orchestrator::Orchestrator;
