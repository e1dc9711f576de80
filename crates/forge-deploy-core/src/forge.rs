//! Forge API client for site deployments
//!
//! Only the handful of endpoints the deploy flow needs:
//! - list servers and sites (target selection)
//! - read site deployment status
//! - start a deployment and follow its history record
//! - fetch the deployment log

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::AppConfig;
use crate::error::{ForgeError, Result};

pub const DEFAULT_API_URL: &str = "https://forge.laravel.com/api/v1";

/// Server as returned by `GET /servers`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub ip_address: Option<String>,
}

/// Site as returned by `GET /servers/{server}/sites/{site}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub id: u64,
    pub name: String,
    /// `null` when idle, otherwise e.g. `queued` or `deploying`
    #[serde(default)]
    pub deployment_status: Option<String>,
}

impl Site {
    pub fn url(&self) -> String {
        format!("https://{}", self.name)
    }
}

/// One entry of a site's deployment history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub id: u64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub ended_at: Option<String>,
}

#[derive(Deserialize)]
struct ServersResponse {
    servers: Vec<Server>,
}

#[derive(Deserialize)]
struct SitesResponse {
    sites: Vec<Site>,
}

#[derive(Deserialize)]
struct SiteResponse {
    site: Site,
}

#[derive(Deserialize)]
struct DeploymentsResponse {
    deployments: Vec<DeploymentRecord>,
}

#[derive(Deserialize)]
struct DeploymentResponse {
    deployment: DeploymentRecord,
}

#[derive(Deserialize)]
struct OutputResponse {
    #[serde(default)]
    output: String,
}

/// Remote operations the deployment flow depends on
#[allow(async_fn_in_trait)]
pub trait DeploymentApi {
    async fn site(&self, server_id: u64, site_id: u64) -> Result<Site>;

    /// Queue a deployment without waiting for it
    async fn start_deployment(&self, server_id: u64, site_id: u64) -> Result<()>;

    /// Deployment history, most recent first
    async fn deployments(&self, server_id: u64, site_id: u64) -> Result<Vec<DeploymentRecord>>;

    async fn deployment(
        &self,
        server_id: u64,
        site_id: u64,
        deployment_id: u64,
    ) -> Result<DeploymentRecord>;

    async fn deployment_output(
        &self,
        server_id: u64,
        site_id: u64,
        deployment_id: u64,
    ) -> Result<String>;
}

/// HTTP client for the Forge API
pub struct ForgeClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl ForgeClient {
    /// Create a new client against `base_url` authenticated with `token`
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(config.api_url(), config.api_token()?)
    }

    /// Build request headers
    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("forge-deploy/", env!("CARGO_PKG_VERSION"))),
        );

        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.token)) {
            headers.insert(AUTHORIZATION, value);
        }

        headers
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        debug!("GET {}", path);

        let response = self
            .client
            .get(self.url(path))
            .headers(self.headers())
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    async fn post(&self, path: &str) -> Result<()> {
        debug!("POST {}", path);

        let response = self
            .client
            .post(self.url(path))
            .headers(self.headers())
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    pub async fn servers(&self) -> Result<Vec<Server>> {
        let data: ServersResponse = self.get("servers").await?;
        Ok(data.servers)
    }

    pub async fn sites(&self, server_id: u64) -> Result<Vec<Site>> {
        let data: SitesResponse = self.get(&format!("servers/{}/sites", server_id)).await?;
        Ok(data.sites)
    }

    /// Find a site id by name, falling back to a numeric id
    pub async fn resolve_site(&self, server_id: u64, name: &str) -> Result<u64> {
        let sites = self.sites(server_id).await?;
        find_site_id(&sites, name).ok_or_else(|| ForgeError::SiteNotFound {
            name: name.to_string(),
            server: server_id,
        })
    }
}

/// Match a site by exact name, else treat `name` as an id
pub fn find_site_id(sites: &[Site], name: &str) -> Option<u64> {
    sites
        .iter()
        .find(|site| site.name == name)
        .map(|site| site.id)
        .or_else(|| name.parse().ok())
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(ForgeError::Api { status, body })
}

impl DeploymentApi for ForgeClient {
    async fn site(&self, server_id: u64, site_id: u64) -> Result<Site> {
        let data: SiteResponse = self
            .get(&format!("servers/{}/sites/{}", server_id, site_id))
            .await?;
        Ok(data.site)
    }

    async fn start_deployment(&self, server_id: u64, site_id: u64) -> Result<()> {
        self.post(&format!(
            "servers/{}/sites/{}/deployment/deploy",
            server_id, site_id
        ))
        .await
    }

    async fn deployments(&self, server_id: u64, site_id: u64) -> Result<Vec<DeploymentRecord>> {
        let data: DeploymentsResponse = self
            .get(&format!(
                "servers/{}/sites/{}/deployment-history",
                server_id, site_id
            ))
            .await?;
        Ok(data.deployments)
    }

    async fn deployment(
        &self,
        server_id: u64,
        site_id: u64,
        deployment_id: u64,
    ) -> Result<DeploymentRecord> {
        let data: DeploymentResponse = self
            .get(&format!(
                "servers/{}/sites/{}/deployment-history/{}",
                server_id, site_id, deployment_id
            ))
            .await?;
        Ok(data.deployment)
    }

    async fn deployment_output(
        &self,
        server_id: u64,
        site_id: u64,
        deployment_id: u64,
    ) -> Result<String> {
        let data: OutputResponse = self
            .get(&format!(
                "servers/{}/sites/{}/deployment-history/{}/output",
                server_id, site_id, deployment_id
            ))
            .await?;
        Ok(data.output)
    }
}
