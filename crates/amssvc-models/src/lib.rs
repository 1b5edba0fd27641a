//! Shared data models for amssvc.
//!
//! This crate provides Serde-serializable types for:
//! - Encoding jobs and their identifiers
//! - The job status state machine
//! - Parsed status update requests

pub mod error;
pub mod job;
pub mod job_status;

// Re-export common types
pub use error::{ModelError, ModelResult};
pub use job::{Job, JobId};
pub use job_status::{JobStatus, StatusUpdate};
