//! In-memory job store.
//!
//! This crate provides:
//! - Keyed storage for encoding jobs
//! - Snapshot queries with an optional status filter
//! - Atomic claim of the oldest dispatchable job

pub mod error;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::{JobFilter, JobStore};
