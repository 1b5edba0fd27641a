//! Dispatcher metrics.

use metrics::counter;

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_CLAIMED_TOTAL: &str = "amssvc_jobs_claimed_total";
    pub const JOBS_FINISHED_TOTAL: &str = "amssvc_jobs_finished_total";
    pub const JOBS_FAILED_TOTAL: &str = "amssvc_jobs_failed_total";
}

/// Record a job claimed from the store.
pub fn record_job_claimed() {
    counter!(names::JOBS_CLAIMED_TOTAL).increment(1);
}

/// Record a job recorded as finished.
pub fn record_job_finished() {
    counter!(names::JOBS_FINISHED_TOTAL).increment(1);
}

/// Record a job recorded as failed.
pub fn record_job_failed() {
    counter!(names::JOBS_FAILED_TOTAL).increment(1);
}
