//! Dispatcher configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How a claimed job is recorded when a provider call fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CompletionPolicy {
    /// A failed call marks the job `failed` with the error text.
    #[default]
    Strict,
    /// Call errors are logged and the job is marked `finished` regardless.
    Optimistic,
}

impl CompletionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionPolicy::Strict => "strict",
            CompletionPolicy::Optimistic => "optimistic",
        }
    }
}

impl fmt::Display for CompletionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompletionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(CompletionPolicy::Strict),
            "optimistic" => Ok(CompletionPolicy::Optimistic),
            other => Err(format!("unknown completion policy: {}", other)),
        }
    }
}

/// Dispatcher configuration.
#[derive(Clone)]
pub struct DispatcherConfig {
    /// Sleep between polls when the queue is empty
    pub poll_interval: Duration,
    /// Outcome recorded for failed provider calls
    pub completion: CompletionPolicy,
    /// SAS query string appended to every job input base URI
    pub sas_token: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            completion: CompletionPolicy::Strict,
            sas_token: String::new(),
        }
    }
}

impl DispatcherConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            poll_interval: Duration::from_secs(
                std::env::var("NO_JOB_WAIT_TIME")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            completion: std::env::var("DISPATCH_COMPLETION")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            sas_token: std::env::var("SASTOKEN").unwrap_or_default(),
        }
    }
}

impl fmt::Debug for DispatcherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherConfig")
            .field("poll_interval", &self.poll_interval)
            .field("completion", &self.completion)
            .field("sas_token", &if self.sas_token.is_empty() { "" } else { "<redacted>" })
            .finish()
    }
}
