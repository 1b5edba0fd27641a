//! Media services error types.

use thiserror::Error;

/// Result type for provider and credential operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while talking to the identity or media provider.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Credential failure: {0}")]
    CredentialFailure(String),

    #[error("{operation} failed: {message}")]
    ExternalCallFailure {
        operation: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Invalid source URL: {0}")]
    InvalidSource(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MediaError {
    pub fn credential_failure(msg: impl Into<String>) -> Self {
        Self::CredentialFailure(msg.into())
    }

    pub fn external_call(operation: impl Into<String>, status: Option<u16>, msg: impl Into<String>) -> Self {
        Self::ExternalCallFailure {
            operation: operation.into(),
            status,
            message: msg.into(),
        }
    }

    pub fn invalid_source(msg: impl Into<String>) -> Self {
        Self::InvalidSource(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// HTTP status of a failed provider call, if the provider answered.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            MediaError::ExternalCallFailure { status, .. } => *status,
            _ => None,
        }
    }
}
