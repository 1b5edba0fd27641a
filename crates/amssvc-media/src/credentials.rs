//! Bearer credential lifecycle.
//!
//! One [`CredentialManager`] owns the only [`CredentialPublisher`] and keeps
//! the published token fresh. Any number of [`CredentialReader`]s read the
//! latest value without coordinating with the writer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::error::MediaResult;
use crate::metrics::record_credential_refresh;

/// Percentage of the reported token lifetime to wait before refreshing.
const REFRESH_PERCENT: u32 = 97;

/// Refresh delay when the identity provider does not report a lifetime.
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(3500);

/// Delay before retrying a failed refresh.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(30);

/// A token returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_in: Option<Duration>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_in: Option<Duration>) -> Self {
        Self {
            value: value.into(),
            expires_in,
        }
    }
}

/// Source of fresh bearer tokens.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> MediaResult<AccessToken>;
}

/// Create the credential cell, returning its single writer and a reader.
pub fn credential_channel() -> (CredentialPublisher, CredentialReader) {
    let (tx, rx) = watch::channel(None);
    (CredentialPublisher { tx }, CredentialReader { rx })
}

/// Write half of the credential cell. Deliberately not `Clone`.
#[derive(Debug)]
pub struct CredentialPublisher {
    tx: watch::Sender<Option<String>>,
}

impl CredentialPublisher {
    /// Replace the current credential.
    pub fn publish(&self, token: impl Into<String>) {
        self.tx.send_replace(Some(token.into()));
    }

    /// Get a new reader for the cell.
    pub fn reader(&self) -> CredentialReader {
        CredentialReader {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read half of the credential cell.
#[derive(Debug, Clone)]
pub struct CredentialReader {
    rx: watch::Receiver<Option<String>>,
}

impl CredentialReader {
    /// The most recently published credential, if any.
    pub fn current(&self) -> Option<String> {
        self.rx.borrow().clone()
    }

    pub fn is_available(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Wait until a credential has been published.
    ///
    /// Returns `None` if the publisher was dropped without ever publishing.
    pub async fn wait_for_credential(&self) -> Option<String> {
        let mut rx = self.rx.clone();
        let published = rx.wait_for(Option::is_some).await.ok()?;
        published.clone()
    }
}

/// Credential refresh timing.
#[derive(Debug, Clone)]
pub struct CredentialConfig {
    /// Refresh delay when the token lifetime is unknown
    pub refresh_interval: Duration,
    /// Retry delay after a failed refresh
    pub retry_delay: Duration,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl CredentialConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            refresh_interval: Duration::from_secs(
                std::env::var("TOKEN_REFRESH_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_REFRESH_INTERVAL.as_secs()),
            ),
            retry_delay: Duration::from_secs(
                std::env::var("TOKEN_RETRY_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_RETRY_DELAY.as_secs()),
            ),
        }
    }
}

/// Background process that keeps the published credential valid.
pub struct CredentialManager {
    source: Arc<dyn TokenSource>,
    publisher: CredentialPublisher,
    config: CredentialConfig,
}

impl CredentialManager {
    pub fn new(
        source: Arc<dyn TokenSource>,
        publisher: CredentialPublisher,
        config: CredentialConfig,
    ) -> Self {
        Self {
            source,
            publisher,
            config,
        }
    }

    /// Run one refresh cycle and return the delay before the next one.
    ///
    /// Nothing is published on failure; the previous credential, if any,
    /// stays in place.
    pub async fn refresh_once(&self) -> Duration {
        match self.source.fetch().await {
            Ok(token) => {
                let delay = self.refresh_delay(&token);
                self.publisher.publish(token.value);
                record_credential_refresh(true);
                info!(next_refresh_secs = delay.as_secs(), "Set new auth token");
                delay
            }
            Err(e) => {
                record_credential_refresh(false);
                error!(
                    retry_in_secs = self.config.retry_delay.as_secs(),
                    "Error while getting auth token: {}", e
                );
                self.config.retry_delay
            }
        }
    }

    /// A lifetime too large to scale falls back to the default interval.
    fn refresh_delay(&self, token: &AccessToken) -> Duration {
        token
            .expires_in
            .and_then(|ttl| ttl.checked_mul(REFRESH_PERCENT))
            .map(|scaled| scaled / 100)
            .filter(|delay| !delay.is_zero())
            .unwrap_or(self.config.refresh_interval)
    }

    /// Refresh until the shutdown signal flips to `true`.
    ///
    /// A fetch in progress is never cancelled; the signal is observed while
    /// sleeping and at the start of every cycle.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting credential manager");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let delay = self.refresh_once().await;

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                result = shutdown.changed() => {
                    if result.is_err() {
                        debug!("Shutdown sender dropped");
                        break;
                    }
                }
            }
        }

        info!("Credential manager stopped");
    }
}
