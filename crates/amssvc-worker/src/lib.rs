//! Job dispatcher.
//!
//! This crate provides:
//! - The dispatch loop claiming jobs from the store one at a time
//! - Asset creation and job submission against the provider
//! - Completion policy for failed provider calls
//! - Graceful shutdown at iteration boundaries

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod metrics;

pub use config::{CompletionPolicy, DispatcherConfig};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
