//! Job status state machine and status update requests.
//!
//! Status keywords are parsed through a single total mapping; any keyword
//! outside the six known states is rejected. No transition guard exists:
//! any parsed status may be applied to any job.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Job processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job was accepted and waits for the dispatcher
    #[default]
    Created,
    /// Job was explicitly queued
    Queued,
    /// Job has been claimed and is being submitted
    Running,
    /// Job is on hold and will not be dispatched
    Paused,
    /// Submission to the provider completed
    Finished,
    /// Submission failed, see the job's error message
    Failed,
}

impl JobStatus {
    /// All states, in lifecycle order.
    pub const ALL: [JobStatus; 6] = [
        JobStatus::Created,
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Paused,
        JobStatus::Finished,
        JobStatus::Failed,
    ];

    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Created => "created",
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Paused => "paused",
            JobStatus::Finished => "finished",
            JobStatus::Failed => "failed",
        }
    }

    /// Map a status keyword (case-insensitive) to a state.
    pub fn parse(raw: &str) -> ModelResult<Self> {
        match raw.trim().to_lowercase().as_str() {
            "created" => Ok(JobStatus::Created),
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "paused" => Ok(JobStatus::Paused),
            "finished" => Ok(JobStatus::Finished),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(ModelError::bad_request(format!(
                "could not parse status value {}",
                raw
            ))),
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }

    /// Check if a job in this state may be claimed by the dispatcher.
    pub fn is_dispatchable(&self) -> bool {
        matches!(self, JobStatus::Created | JobStatus::Queued)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A validated status change for a single job.
///
/// The error message is only retained when the target state is `failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    status: JobStatus,
    error_message: String,
}

impl StatusUpdate {
    /// Parse a raw status keyword and optional error message.
    pub fn parse(raw_status: &str, raw_error_message: Option<&str>) -> ModelResult<Self> {
        let status = JobStatus::parse(raw_status)?;
        Ok(Self::new(status, raw_error_message.unwrap_or_default()))
    }

    /// Build an update from an already-typed status.
    pub fn new(status: JobStatus, error_message: impl Into<String>) -> Self {
        let error_message = if status == JobStatus::Failed {
            error_message.into()
        } else {
            String::new()
        };
        Self {
            status,
            error_message,
        }
    }

    pub fn finished() -> Self {
        Self::new(JobStatus::Finished, "")
    }

    pub fn failed(error_message: impl Into<String>) -> Self {
        Self::new(JobStatus::Failed, error_message)
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_all_keywords_any_case() {
        for status in JobStatus::ALL {
            let lower = status.as_str();
            let upper = lower.to_uppercase();
            let mixed: String = lower
                .chars()
                .enumerate()
                .map(|(i, c)| if i % 2 == 0 { c.to_ascii_uppercase() } else { c })
                .collect();

            assert_eq!(JobStatus::parse(lower).unwrap(), status);
            assert_eq!(JobStatus::parse(&upper).unwrap(), status);
            assert_eq!(JobStatus::parse(&mixed).unwrap(), status);
        }
    }

    #[test]
    fn test_parse_rejects_unknown_keywords() {
        for raw in ["Done", "", "complete", "fail", "run ning"] {
            let err = StatusUpdate::parse(raw, None).unwrap_err();
            assert!(matches!(err, ModelError::BadRequest(_)), "{raw:?} should fail");
        }
    }

    #[test]
    fn test_error_message_only_kept_for_failed() {
        let failed = StatusUpdate::parse("FAILED", Some("encoder crashed")).unwrap();
        assert_eq!(failed.status(), JobStatus::Failed);
        assert_eq!(failed.error_message(), "encoder crashed");

        let finished = StatusUpdate::parse("finished", Some("ignored")).unwrap();
        assert_eq!(finished.status(), JobStatus::Finished);
        assert_eq!(finished.error_message(), "");
    }

    #[test]
    fn test_dispatchable_states() {
        let dispatchable: Vec<_> = JobStatus::ALL
            .into_iter()
            .filter(JobStatus::is_dispatchable)
            .collect();
        assert_eq!(dispatchable, vec![JobStatus::Created, JobStatus::Queued]);
        assert!(JobStatus::Finished.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Paused.is_terminal());
    }

    #[test]
    fn test_status_serializes_as_keyword() {
        let json = serde_json::to_string(&JobStatus::Paused).unwrap();
        assert_eq!(json, "\"paused\"");
        let parsed: JobStatus = "Queued".parse().unwrap();
        assert_eq!(parsed, JobStatus::Queued);
    }
}
