//! Asset and job request construction.
//!
//! Both provider calls are derived from the job's source URL alone:
//! - the output asset is `<file stem>_proxy`
//! - the job input points at the source's parent folder plus the SAS suffix

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{MediaError, MediaResult};

/// Suffix appended to the source file stem to name the output asset.
pub const ASSET_SUFFIX: &str = "_proxy";

/// Priority of every submitted job.
pub const JOB_PRIORITY: &str = "Normal";

const JOB_INPUT_HTTP: &str = "#Microsoft.Media.JobInputHttp";
const JOB_OUTPUT_ASSET: &str = "#Microsoft.Media.JobOutputAsset";

/// Body of the asset create-or-update call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRequest {}

/// Body of the job create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmsJobRequest {
    pub properties: JobProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProperties {
    pub input: JobInput,
    pub outputs: Vec<JobOutput>,
    pub priority: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInput {
    #[serde(rename = "@odata.type")]
    pub odata_type: String,
    #[serde(rename = "baseUri")]
    pub base_uri: String,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutput {
    #[serde(rename = "@odata.type")]
    pub odata_type: String,
    #[serde(rename = "assetName")]
    pub asset_name: String,
}

/// The parts of a source URL the provider requests are built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMedia {
    /// Last path segment, e.g. `clip.mp4`
    pub file_name: String,
    /// `<scheme>://<host>[:port]`
    pub origin: String,
    /// Parent folder of the file, without leading or trailing slash
    pub parent_path: String,
}

impl SourceMedia {
    pub fn parse(source_url: &str) -> MediaResult<Self> {
        let url = Url::parse(source_url.trim())
            .map_err(|e| MediaError::invalid_source(format!("{}: {}", source_url, e)))?;

        let host = url
            .host_str()
            .ok_or_else(|| MediaError::invalid_source(format!("{} has no host", source_url)))?;

        let origin = match url.port() {
            Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
            None => format!("{}://{}", url.scheme(), host),
        };

        let path = url.path().trim_end_matches('/');
        let (parent, file_name) = path.rsplit_once('/').unwrap_or(("", path));
        if file_name.is_empty() {
            return Err(MediaError::invalid_source(format!(
                "{} does not name a file",
                source_url
            )));
        }

        Ok(Self {
            file_name: file_name.to_string(),
            origin,
            parent_path: parent.trim_matches('/').to_string(),
        })
    }

    /// File name without the text from its last `.` onward, so `.hidden`
    /// has an empty stem.
    pub fn file_stem(&self) -> &str {
        match self.file_name.rfind('.') {
            Some(idx) => &self.file_name[..idx],
            None => &self.file_name,
        }
    }

    /// Name of the output asset, `<file stem>_proxy`.
    pub fn asset_name(&self) -> String {
        format!("{}{}", self.file_stem(), ASSET_SUFFIX)
    }

    /// `<origin>/<parent path>/<sas suffix>`, the SAS suffix appended verbatim.
    /// A file at the host root keeps both separators: `<origin>//<sas suffix>`.
    pub fn base_uri(&self, sas_token: &str) -> String {
        format!("{}/{}/{}", self.origin, self.parent_path, sas_token)
    }

    /// Job submission payload reading this file into the derived asset.
    pub fn job_request(&self, sas_token: &str) -> AmsJobRequest {
        AmsJobRequest {
            properties: JobProperties {
                input: JobInput {
                    odata_type: JOB_INPUT_HTTP.to_string(),
                    base_uri: self.base_uri(sas_token),
                    files: vec![self.file_name.clone()],
                },
                outputs: vec![JobOutput {
                    odata_type: JOB_OUTPUT_ASSET.to_string(),
                    asset_name: self.asset_name(),
                }],
                priority: JOB_PRIORITY.to_string(),
            },
        }
    }
}
