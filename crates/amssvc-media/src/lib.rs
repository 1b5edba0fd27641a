//! Azure Media Services plumbing.
//!
//! This crate provides:
//! - Provider and identity configuration from the environment
//! - A single-writer credential cell and the background refresh loop
//! - Client-credentials token acquisition against Azure AD
//! - Asset and job request construction
//! - The ARM REST client for asset creation and job submission

pub mod aad;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod metrics;
pub mod requests;

pub use aad::AadTokenSource;
pub use client::{AmsClient, MediaServicesApi};
pub use config::{IdentityConfig, MediaServicesConfig};
pub use credentials::{
    credential_channel, AccessToken, CredentialConfig, CredentialManager, CredentialPublisher,
    CredentialReader, TokenSource,
};
pub use error::{MediaError, MediaResult};
pub use requests::{AmsJobRequest, AssetRequest, SourceMedia};
