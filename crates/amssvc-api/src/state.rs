//! Application state.

use std::sync::Arc;

use amssvc_media::CredentialReader;
use amssvc_store::JobStore;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<JobStore>,
    pub credentials: CredentialReader,
}

impl AppState {
    pub fn new(config: ApiConfig, store: Arc<JobStore>, credentials: CredentialReader) -> Self {
        Self {
            config,
            store,
            credentials,
        }
    }
}
