//! Azure Media Services ARM client.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info_span, Instrument};

use amssvc_models::JobId;

use crate::config::MediaServicesConfig;
use crate::error::{MediaError, MediaResult};
use crate::metrics::record_provider_call;
use crate::requests::{AmsJobRequest, AssetRequest};

/// The two provider calls the dispatcher makes per job.
#[async_trait]
pub trait MediaServicesApi: Send + Sync {
    /// Create or replace the output asset named `asset_name`.
    async fn create_asset(&self, asset_name: &str, token: &str) -> MediaResult<()>;

    /// Submit an encoding job under the configured transform.
    async fn submit_job(&self, job_id: &JobId, request: &AmsJobRequest, token: &str) -> MediaResult<()>;
}

/// reqwest implementation of [`MediaServicesApi`].
pub struct AmsClient {
    http: Client,
    config: MediaServicesConfig,
}

impl AmsClient {
    pub fn new(config: MediaServicesConfig) -> MediaResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("amssvc/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, config })
    }

    pub fn asset_url(&self, asset_name: &str) -> String {
        format!(
            "{}/assets/{}?api-version={}",
            self.config.account_url(),
            asset_name,
            self.config.api_version
        )
    }

    pub fn job_url(&self, job_id: &JobId) -> String {
        format!(
            "{}/transforms/{}/jobs/{}?api-version={}",
            self.config.account_url(),
            self.config.transform_name,
            job_id,
            self.config.api_version
        )
    }

    async fn put_json<T: Serialize + Sync>(
        &self,
        operation: &str,
        url: &str,
        body: &T,
        token: &str,
    ) -> MediaResult<()> {
        let result = async {
            let response = self
                .http
                .put(url)
                .bearer_auth(token)
                .json(body)
                .send()
                .await
                .map_err(|e| MediaError::external_call(operation, None, e.to_string()))?;

            let status = response.status();
            if status.is_success() {
                debug!(status = status.as_u16(), "Provider call succeeded");
                Ok(())
            } else {
                let body = response.text().await.unwrap_or_default();
                Err(MediaError::external_call(
                    operation,
                    Some(status.as_u16()),
                    format!("status {}: {}", status, body),
                ))
            }
        }
        .instrument(info_span!("ams_request", operation = %operation))
        .await;

        record_provider_call(operation, result.is_ok());
        result
    }
}

#[async_trait]
impl MediaServicesApi for AmsClient {
    async fn create_asset(&self, asset_name: &str, token: &str) -> MediaResult<()> {
        let url = self.asset_url(asset_name);
        self.put_json("create_asset", &url, &AssetRequest::default(), token)
            .await
    }

    async fn submit_job(&self, job_id: &JobId, request: &AmsJobRequest, token: &str) -> MediaResult<()> {
        let url = self.job_url(job_id);
        self.put_json("submit_job", &url, request, token).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::{ARM_API_VERSION, DEFAULT_TRANSFORM_NAME};
    use crate::requests::SourceMedia;

    const ACCOUNT: &str = "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Media/mediaServices/acct";

    fn client(endpoint: &str) -> AmsClient {
        AmsClient::new(MediaServicesConfig {
            arm_endpoint: endpoint.to_string(),
            subscription_id: "sub".to_string(),
            resource_group: "rg".to_string(),
            account_name: "acct".to_string(),
            transform_name: DEFAULT_TRANSFORM_NAME.to_string(),
            api_version: ARM_API_VERSION.to_string(),
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
        })
        .unwrap()
    }

    #[test]
    fn test_urls() {
        let ams = client("https://management.azure.com");
        let job_id = JobId::from_string("job-1");

        assert_eq!(
            ams.asset_url("clip_proxy"),
            format!("https://management.azure.com{ACCOUNT}/assets/clip_proxy?api-version=2020-05-01")
        );
        assert_eq!(
            ams.job_url(&job_id),
            format!("https://management.azure.com{ACCOUNT}/transforms/jkuencodeproxy/jobs/job-1?api-version=2020-05-01")
        );
    }

    #[tokio::test]
    async fn test_create_asset_sends_authorized_put() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(format!("{ACCOUNT}/assets/clip_proxy")))
            .and(query_param("api-version", ARM_API_VERSION))
            .and(header("Authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        client(&server.uri()).create_asset("clip_proxy", "tok").await.unwrap();
    }

    #[tokio::test]
    async fn test_submit_job_sends_payload() {
        let server = MockServer::start().await;
        let media = SourceMedia::parse("https://host/path/clip.mp4").unwrap();
        let request = media.job_request("?sig=x");
        let job_id = JobId::from_string("job-42");

        Mock::given(method("PUT"))
            .and(path(format!("{ACCOUNT}/transforms/jkuencodeproxy/jobs/job-42")))
            .and(header("Authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        client(&server.uri())
            .submit_job(&job_id, &request, "tok")
            .await
            .unwrap();

        let received = server.received_requests().await.unwrap();
        let body: AmsJobRequest = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(body, request);
    }

    #[tokio::test]
    async fn test_error_status_becomes_external_call_failure() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(409).set_body_string("asset is locked"))
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .create_asset("clip_proxy", "tok")
            .await
            .unwrap_err();

        assert_eq!(err.http_status(), Some(409));
        assert!(err.to_string().contains("create_asset"));
        assert!(err.to_string().contains("asset is locked"));
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_external_call_failure() {
        // Nothing listens on the discard port.
        let err = client("http://127.0.0.1:9")
            .create_asset("clip_proxy", "tok")
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::ExternalCallFailure { status: None, .. }));
    }
}
