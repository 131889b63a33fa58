//! API liveness probe.

use async_trait::async_trait;
use reqwest::Client;

use crate::config::WatchConfig;
use crate::error::{Result, WatchError};

#[async_trait]
pub trait ApiProbe: Send + Sync + 'static {
    /// API groups served by the cluster, e.g. `["apps", "batch"]`.
    async fn list_groups(&self) -> Result<Vec<String>>;
}

/// `GET {api_url}/apis/groups`.
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    url: String,
}

impl HttpApi {
    pub fn new(config: &WatchConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| WatchError::Config(e.to_string()))?;
        Ok(Self::with_client(client, config.groups_url()))
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }
}

#[async_trait]
impl ApiProbe for HttpApi {
    async fn list_groups(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| WatchError::Probe(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(WatchError::Status { url: self.url.clone(), status: status.as_u16() });
        }
        response.json::<Vec<String>>().await.map_err(|e| WatchError::Probe(e.to_string()))
    }
}
