//! HTTP client for the Astra DevOps API.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::{AstraError, AstraResult};
use crate::resolver::{ConnectionBundle, ControlPlane, DatabaseRef};

/// Default DevOps API endpoint.
pub const DEFAULT_DEVOPS_URL: &str = "https://api.astra.datastax.com";

/// Environment variable overriding the DevOps API endpoint.
pub const DEVOPS_URL_ENV: &str = "ASTRA_DEVOPS_URL";

/// Settings of the DevOps API client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevOpsConfig {
    /// API base URL, without trailing slash.
    pub base_url: String,
    /// Timeout of each HTTP request.
    pub timeout: Duration,
}

impl Default for DevOpsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_DEVOPS_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl DevOpsConfig {
    /// Defaults, with the base URL taken from `ASTRA_DEVOPS_URL` when set.
    pub fn from_env() -> Self {
        match std::env::var(DEVOPS_URL_ENV) {
            Ok(url) if !url.is_empty() => Self::default().base_url(url),
            _ => Self::default(),
        }
    }

    /// Set the base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
struct DatabaseDto {
    id: String,
    info: DatabaseInfoDto,
}

#[derive(Debug, Deserialize)]
struct DatabaseInfoDto {
    name: String,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    datacenters: Vec<DatacenterDto>,
}

#[derive(Debug, Deserialize)]
struct DatacenterDto {
    region: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BundleUrlDto {
    #[serde(default)]
    region: Option<String>,
    #[serde(rename = "downloadURL")]
    download_url: String,
}

impl From<DatabaseDto> for DatabaseRef {
    fn from(dto: DatabaseDto) -> Self {
        let mut regions: Vec<String> = dto.info.datacenters.into_iter().map(|dc| dc.region).collect();
        if regions.is_empty() {
            regions.extend(dto.info.region);
        }
        Self {
            id: dto.id,
            name: dto.info.name,
            regions,
        }
    }
}

fn pick_bundle_url(urls: Vec<BundleUrlDto>, region: &str) -> Option<String> {
    urls.into_iter()
        .find(|url| url.region.as_deref() == Some(region))
        .map(|url| url.download_url)
}

/// [`ControlPlane`] backed by the Astra DevOps API.
#[derive(Clone)]
pub struct DevOpsClient {
    config: DevOpsConfig,
    http_client: reqwest::Client,
}

impl DevOpsClient {
    /// Create a client.
    pub fn new(config: DevOpsConfig) -> AstraResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AstraError::Configuration(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// The client settings.
    pub fn config(&self) -> &DevOpsConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v2{path}", self.config.base_url)
    }

    async fn check(response: reqwest::Response) -> AstraResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                AstraError::Authentication(format!("DevOps API returned {status}: {body}"))
            }
            _ => AstraError::control_plane(format!("DevOps API returned {status}: {body}")),
        })
    }

    async fn download(&self, url: &str) -> AstraResult<Vec<u8>> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| AstraError::bundle(format!("Failed to download bundle: {e}")))?;
        if !response.status().is_success() {
            return Err(AstraError::bundle(format!(
                "Bundle storage returned {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AstraError::bundle(format!("Failed to read bundle: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ControlPlane for DevOpsClient {
    async fn find_by_name(&self, token: &str, name: &str) -> AstraResult<Vec<DatabaseRef>> {
        let response = self
            .http_client
            .get(self.endpoint("/databases"))
            .query(&[("include", "nonterminated"), ("provider", "ALL"), ("limit", "1000")])
            .bearer_auth(token)
            .send()
            .await?;
        let databases: Vec<DatabaseDto> = Self::check(response).await?.json().await?;
        let matches: Vec<DatabaseRef> = databases
            .into_iter()
            .filter(|db| db.info.name == name)
            .map(DatabaseRef::from)
            .collect();
        debug!(name, matches = matches.len(), "Listed databases by name");
        Ok(matches)
    }

    async fn get_by_id(&self, token: &str, id: &str) -> AstraResult<Option<DatabaseRef>> {
        let response = self
            .http_client
            .get(self.endpoint(&format!("/databases/{id}")))
            .bearer_auth(token)
            .send()
            .await?;
        // An id that is not a UUID is rejected with 400 rather than 404.
        if matches!(response.status(), StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST) {
            return Ok(None);
        }
        let database: DatabaseDto = Self::check(response).await?.json().await?;
        Ok(Some(database.into()))
    }

    async fn download_bundle(
        &self,
        token: &str,
        database: &DatabaseRef,
        region: Option<&str>,
    ) -> AstraResult<ConnectionBundle> {
        let mut request = self
            .http_client
            .post(self.endpoint(&format!("/databases/{}/secureBundleURL", database.id)))
            .bearer_auth(token);
        if region.is_some() {
            request = request.query(&[("all", "true")]);
        }
        let response = Self::check(request.send().await?).await?;

        let download_url = match region {
            Some(region) => {
                let urls: Vec<BundleUrlDto> = response.json().await?;
                pick_bundle_url(urls, region).ok_or_else(|| {
                    AstraError::bundle(format!(
                        "no bundle for region '{region}' of database '{}'",
                        database.id
                    ))
                })?
            }
            None => response.json::<BundleUrlDto>().await?.download_url,
        };

        let bytes = self.download(&download_url).await?;
        Ok(ConnectionBundle {
            database_id: database.id.clone(),
            region: region.map(str::to_string),
            bytes,
        })
    }
}

impl std::fmt::Debug for DevOpsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevOpsClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_config_base_url() {
        let config = DevOpsConfig::default().base_url("http://localhost:8080/");
        assert_eq!(config.base_url, "http://localhost:8080");
        let client = DevOpsClient::new(config).unwrap();
        assert_eq!(client.endpoint("/databases"), "http://localhost:8080/v2/databases");
    }

    #[test]
    fn test_database_from_json() {
        let json = r#"{
            "id": "3ed83de7-d97f-4fb6-bf9f-82e9f7eafa23",
            "orgId": "org",
            "status": "ACTIVE",
            "info": {
                "name": "orders",
                "keyspace": "sales",
                "region": "us-east1",
                "datacenters": [
                    {"id": "dc-1", "region": "us-east1"},
                    {"id": "dc-2", "region": "europe-west1"}
                ]
            }
        }"#;
        let dto: DatabaseDto = serde_json::from_str(json).unwrap();
        let database = DatabaseRef::from(dto);
        assert_eq!(database.name, "orders");
        assert_eq!(database.regions, vec!["us-east1".to_string(), "europe-west1".to_string()]);
    }

    #[test]
    fn test_database_without_datacenters_uses_region() {
        let json = r#"{"id": "x", "info": {"name": "n", "region": "us-east1"}}"#;
        let database = DatabaseRef::from(serde_json::from_str::<DatabaseDto>(json).unwrap());
        assert_eq!(database.regions, vec!["us-east1".to_string()]);
    }

    #[test]
    fn test_pick_bundle_url() {
        let json = r#"[
            {"region": "us-east1", "downloadURL": "https://b/1", "datacenterID": "dc-1"},
            {"region": "europe-west1", "downloadURL": "https://b/2", "datacenterID": "dc-2"}
        ]"#;
        let urls: Vec<BundleUrlDto> = serde_json::from_str(json).unwrap();
        assert_eq!(pick_bundle_url(urls, "europe-west1").as_deref(), Some("https://b/2"));

        let urls: Vec<BundleUrlDto> = serde_json::from_str(json).unwrap();
        assert_eq!(pick_bundle_url(urls, "ap-south1"), None);
    }
}
