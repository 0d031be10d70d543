//! Catalog trait for reading patch metadata and writing agent state

#[cfg(test)]
use mockall::automock;

use crate::catalog::error::CatalogError;
use crate::catalog::types::{AgentRecord, MonitoredProduct, PatchDescriptor, StatusEvent};

/// Trait for the remote catalog the agent polls and reports to
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Catalog: Send + Sync {
    /// Fetches the products this agent is asked to keep up to date
    async fn list_monitored_products(
        &self,
        agent_id: &str,
    ) -> Result<Vec<MonitoredProduct>, CatalogError>;

    /// Fetches the latest patch for a product, or for the agent itself
    /// when `target` is "Agent"
    ///
    /// # Returns
    /// * `Ok(None)` - The catalog knows no patch for this target
    async fn get_latest_patch(
        &self,
        agent_id: &str,
        target: &str,
    ) -> Result<Option<PatchDescriptor>, CatalogError>;

    /// Fetches the catalog's record of this agent
    async fn get_agent(&self, agent_id: &str) -> Result<Option<AgentRecord>, CatalogError>;

    async fn update_agent_version(
        &self,
        agent_id: &str,
        new_version: &str,
    ) -> Result<(), CatalogError>;

    async fn update_product_version(
        &self,
        agent_id: &str,
        product: &str,
        new_version: &str,
    ) -> Result<(), CatalogError>;

    /// Appends a status event; the catalog deduplicates repeats
    async fn report_status(&self, event: &StatusEvent) -> Result<(), CatalogError>;

    /// Downloads a patch payload. `url` may be absolute or relative to the
    /// catalog base URL.
    async fn download_payload(&self, url: &str) -> Result<Vec<u8>, CatalogError>;
}
