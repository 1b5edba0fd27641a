//! Azure AD client-credentials token source.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::IdentityConfig;
use crate::credentials::{AccessToken, TokenSource};
use crate::error::{MediaError, MediaResult};

/// Fetches bearer tokens with the OAuth2 client-credentials grant.
pub struct AadTokenSource {
    http: Client,
    config: IdentityConfig,
}

impl AadTokenSource {
    pub fn new(config: IdentityConfig) -> MediaResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("amssvc/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl TokenSource for AadTokenSource {
    async fn fetch(&self) -> MediaResult<AccessToken> {
        let url = self.config.token_url();
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("resource", self.config.audience.as_str()),
        ];

        let response = self
            .http
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| MediaError::credential_failure(format!("token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::credential_failure(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| MediaError::credential_failure(format!("invalid token response: {}", e)))?;

        let token = parse_token_response(&body)?;
        debug!(expires_in = ?token.expires_in, "Received access token");
        Ok(token)
    }
}

/// Extract the access token and its lifetime from a token endpoint response.
///
/// Azure AD v1 endpoints report `expires_in` as a numeric string, v2 as a
/// number; both are accepted.
fn parse_token_response(body: &Value) -> MediaResult<AccessToken> {
    let value = body
        .get("access_token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| MediaError::credential_failure("response contained no access_token"))?;

    let expires_in = body.get("expires_in").and_then(|v| match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    });

    Ok(AccessToken::new(value, expires_in.map(Duration::from_secs)))
}
