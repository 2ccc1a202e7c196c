//! Page-side client for cairn.
//!
//! This crate provides:
//! - `Orchestrator`, cache-first directory listings over a worker channel
//! - Request/response correlation with per-request timeouts
//! - A persistent progress listener registry with failure isolation

pub mod error;
pub mod listeners;
pub mod orchestrator;

pub use error::{OrchestratorError, OrchestratorResult};
pub use listeners::{ListenerId, ListenerRegistry, ProgressCallback};
pub use orchestrator::{Listing, Orchestrator};
