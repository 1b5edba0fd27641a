//! Structured job logging.

use tracing::{error, info, warn, Span};

use amssvc_models::JobId;

/// Logs dispatch lifecycle events with the job id and source attached.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    source_url: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, source_url: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            source_url: source_url.to_string(),
        }
    }

    pub fn log_claimed(&self) {
        info!(
            job_id = %self.job_id,
            source_url = %self.source_url,
            "Claimed job for dispatch"
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(job_id = %self.job_id, "Job progress: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, "Job warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            source_url = %self.source_url,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(job_id = %self.job_id, "Job completed: {}", message);
    }

    /// Span covering the whole dispatch of this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("dispatch", job_id = %self.job_id)
    }
}
