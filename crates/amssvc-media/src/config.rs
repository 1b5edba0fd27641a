//! Identity and media services configuration.

use std::fmt;
use std::time::Duration;

use crate::error::{MediaError, MediaResult};

/// Default Azure AD authority.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Default transform used for proxy encodes.
pub const DEFAULT_TRANSFORM_NAME: &str = "jkuencodeproxy";

/// ARM API version for the asset and job endpoints.
pub const ARM_API_VERSION: &str = "2020-05-01";

/// Azure AD client-credentials configuration.
#[derive(Clone)]
pub struct IdentityConfig {
    /// Authority base URL, without tenant
    pub authority: String,
    /// Tenant domain used in the token path
    pub tenant_domain: String,
    /// Tenant id
    pub tenant_id: String,
    /// Application (client) id
    pub client_id: String,
    /// Client secret
    pub client_secret: String,
    /// Target audience (`resource` form field)
    pub audience: String,
    /// Token request timeout
    pub timeout: Duration,
}

impl IdentityConfig {
    /// Create config from environment variables.
    pub fn from_env() -> MediaResult<Self> {
        Ok(Self {
            authority: std::env::var("AADAUTHORITY").unwrap_or_else(|_| DEFAULT_AUTHORITY.to_string()),
            tenant_domain: required("AADTENANTDOMAIN")?,
            tenant_id: required("AADTENANTID")?,
            client_id: required("AADCLIENTID")?,
            client_secret: required("AADSECRET")?,
            audience: required("ARMAADAUDIENCE")?,
            timeout: Duration::from_secs(
                std::env::var("AMS_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        })
    }

    /// Token endpoint for the configured tenant.
    pub fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/token",
            self.authority.trim_end_matches('/'),
            self.tenant_domain
        )
    }
}

impl fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("authority", &self.authority)
            .field("tenant_domain", &self.tenant_domain)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("audience", &self.audience)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Azure Media Services (ARM) configuration.
#[derive(Clone)]
pub struct MediaServicesConfig {
    /// ARM endpoint base URL
    pub arm_endpoint: String,
    /// Subscription id
    pub subscription_id: String,
    /// Resource group
    pub resource_group: String,
    /// Media services account name
    pub account_name: String,
    /// Transform that job submissions run under
    pub transform_name: String,
    /// ARM API version
    pub api_version: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
}

impl MediaServicesConfig {
    /// Create config from environment variables.
    pub fn from_env() -> MediaResult<Self> {
        Ok(Self {
            arm_endpoint: required("ARMENDPOINT")?,
            subscription_id: required("SUBSCRIPTIONID")?,
            resource_group: required("RESOURCEGROUP")?,
            account_name: required("ACCOUNTNAME")?,
            transform_name: std::env::var("TRANSFORMNAME")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_TRANSFORM_NAME.to_string()),
            api_version: ARM_API_VERSION.to_string(),
            timeout: Duration::from_secs(
                std::env::var("AMS_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            connect_timeout: Duration::from_secs(5),
        })
    }

    /// Base path of the media services account.
    pub fn account_url(&self) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Media/mediaServices/{}",
            self.arm_endpoint.trim_end_matches('/'),
            self.subscription_id,
            self.resource_group,
            self.account_name
        )
    }
}

impl fmt::Debug for MediaServicesConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaServicesConfig")
            .field("arm_endpoint", &self.arm_endpoint)
            .field("subscription_id", &self.subscription_id)
            .field("resource_group", &self.resource_group)
            .field("account_name", &self.account_name)
            .field("transform_name", &self.transform_name)
            .field("api_version", &self.api_version)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn required(name: &str) -> MediaResult<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(MediaError::config(format!("no {} set", name))),
    }
}
