//! Encoding job entity.

use std::fmt;

use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};
use crate::job_status::{JobStatus, StatusUpdate};

/// Unique, time-sortable identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new time-ordered job ID (UUIDv7).
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// An encoding request for a single source media file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Human readable label
    pub name: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Who created the job
    #[serde(default)]
    pub created_by: String,

    /// Last mutation timestamp
    pub modified_at: DateTime<Utc>,

    /// Who last modified the job
    #[serde(default)]
    pub modified_by: String,

    /// Source media location
    pub source_url: String,

    /// Current status
    #[serde(default)]
    pub status: JobStatus,

    /// Error message, only set when status is `failed`
    #[serde(default)]
    pub error_message: String,
}

impl Job {
    /// Create a new job in the `created` state.
    ///
    /// Fails when `source_url` is blank. A blank `name` is replaced by
    /// `"new job @ <local timestamp>"`.
    pub fn create(name: &str, source_url: &str) -> ModelResult<Self> {
        if source_url.trim().is_empty() {
            return Err(ModelError::bad_request("Job must have a source URL"));
        }

        let now = Utc::now();
        Ok(Self {
            id: JobId::new(),
            name: job_name(name),
            created_at: now,
            created_by: String::new(),
            modified_at: now,
            modified_by: String::new(),
            source_url: source_url.to_string(),
            status: JobStatus::Created,
            error_message: String::new(),
        })
    }

    /// Bump `modified_at`, never moving it before `created_at`.
    pub fn touch(&mut self) {
        self.modified_at = Utc::now().max(self.created_at);
    }

    /// Apply a status update and bump the modification timestamp.
    pub fn apply(&mut self, update: &StatusUpdate) {
        self.status = update.status();
        self.error_message = update.error_message().to_string();
        self.touch();
    }

    /// Mark the job as claimed by the dispatcher.
    pub fn start(&mut self) {
        self.apply(&StatusUpdate::new(JobStatus::Running, ""));
    }
}

fn job_name(name: &str) -> String {
    if name.trim().is_empty() {
        let now = Local::now().to_rfc3339_opts(SecondsFormat::Secs, false);
        format!("new job @ {}", now)
    } else {
        name.to_string()
    }
}
