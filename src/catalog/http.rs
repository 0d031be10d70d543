//! REST implementation of the catalog

use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::catalog::client::Catalog;
use crate::catalog::error::CatalogError;
use crate::catalog::types::{
    AgentRecord, MonitoredProduct, PatchDescriptor, StatusEvent, UpdateAgentVersionRequest,
    UpdateProductVersionRequest,
};
use crate::config::CATALOG_REQUEST_TIMEOUT_SECS;

const USER_AGENT: &str = concat!("patch-agent/", env!("CARGO_PKG_VERSION"));

/// Catalog implementation speaking the catalog service's JSON API
pub struct HttpCatalog {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpCatalog {
    /// Creates a client rooted at `base_url`, which should end with `/`
    pub fn new(base_url: Url) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(CATALOG_REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends path segments (percent-encoded) to the base URL
    fn endpoint(&self, segments: &[&str]) -> Result<Url, CatalogError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CatalogError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Maps 404 to `NotFound` and any other non-2xx to `Status`
    fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, CatalogError> {
        let status = response.status();
        let url = response.url().to_string();

        if status == StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(url));
        }

        if !status.is_success() {
            warn!("Catalog returned status {}: {}", status, url);
            return Err(CatalogError::Status {
                status: status.as_u16(),
                url,
            });
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, CatalogError> {
        let response = self.client.get(url).send().await?;
        let response = Self::ensure_success(response)?;

        response.json().await.map_err(|e| {
            warn!("Failed to parse catalog response: {}", e);
            CatalogError::InvalidResponse(e.to_string())
        })
    }

    /// GET returning `None` for 404 and for an empty or 204 body
    async fn get_optional_json<T: DeserializeOwned>(
        &self,
        url: Url,
    ) -> Result<Option<T>, CatalogError> {
        let response = self.client.get(url).send().await?;

        if matches!(
            response.status(),
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND
        ) {
            debug!("Catalog has no entry at {}", response.url());
            return Ok(None);
        }

        let response = Self::ensure_success(response)?;
        let body = response.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        serde_json::from_slice(&body).map(Some).map_err(|e| {
            warn!("Failed to parse catalog response: {}", e);
            CatalogError::InvalidResponse(e.to_string())
        })
    }
}

#[async_trait::async_trait]
impl Catalog for HttpCatalog {
    async fn list_monitored_products(
        &self,
        agent_id: &str,
    ) -> Result<Vec<MonitoredProduct>, CatalogError> {
        let mut url = self.endpoint(&["AgentMonitoredProducts"])?;
        url.query_pairs_mut().append_pair("agentId", agent_id);

        self.get_json(url).await
    }

    async fn get_latest_patch(
        &self,
        agent_id: &str,
        target: &str,
    ) -> Result<Option<PatchDescriptor>, CatalogError> {
        let mut url = self.endpoint(&["patch", "latest"])?;
        url.query_pairs_mut()
            .append_pair("agentId", agent_id)
            .append_pair("product", target);

        self.get_optional_json(url).await
    }

    async fn get_agent(&self, agent_id: &str) -> Result<Option<AgentRecord>, CatalogError> {
        let url = self.endpoint(&["CustomerAgent", agent_id])?;

        self.get_optional_json(url).await
    }

    async fn update_agent_version(
        &self,
        agent_id: &str,
        new_version: &str,
    ) -> Result<(), CatalogError> {
        let url = self.endpoint(&["CustomerAgent", "updateVersion"])?;
        let body = UpdateAgentVersionRequest {
            agent_id,
            current_version: new_version,
        };

        let response = self.client.put(url).json(&body).send().await?;
        Self::ensure_success(response)?;

        debug!("Catalog agent version set to {}", new_version);
        Ok(())
    }

    async fn update_product_version(
        &self,
        agent_id: &str,
        product: &str,
        new_version: &str,
    ) -> Result<(), CatalogError> {
        let url = self.endpoint(&["AgentMonitoredProducts", "updateVersion"])?;
        let body = UpdateProductVersionRequest {
            agent_id,
            monitored_product: product,
            current_version: new_version,
        };

        let response = self.client.put(url).json(&body).send().await?;
        Self::ensure_success(response)?;

        debug!("Catalog version of {} set to {}", product, new_version);
        Ok(())
    }

    async fn report_status(&self, event: &StatusEvent) -> Result<(), CatalogError> {
        let url = self.endpoint(&["status", "report"])?;

        let response = self.client.post(url).json(event).send().await?;
        Self::ensure_success(response)?;

        Ok(())
    }

    async fn download_payload(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        let url = self
            .base_url
            .join(url)
            .map_err(|e| CatalogError::InvalidUrl(format!("{}: {}", url, e)))?;

        let response = self.client.get(url).send().await?;
        let response = Self::ensure_success(response)?;

        Ok(response.bytes().await?.to_vec())
    }
}
