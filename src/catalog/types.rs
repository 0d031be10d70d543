//! Wire types exchanged with the catalog service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::UNKNOWN_VERSION;

/// Whether a patch targets the agent itself or a monitored product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetType {
    Agent,
    Product,
}

/// Outcome states of a patch application, as the catalog records them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatchStatus {
    Unapplied,
    InProcess,
    Applying,
    Applied,
    Failed,
}

/// A product this agent watches, as recorded by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredProduct {
    pub agent_id: String,
    #[serde(rename = "monitoredProduct")]
    pub product_name: String,
    #[serde(default)]
    pub current_version: Option<String>,
}

impl MonitoredProduct {
    /// Catalog-recorded version, "0.0.0" when none is recorded
    pub fn current_version(&self) -> &str {
        self.current_version.as_deref().unwrap_or(UNKNOWN_VERSION)
    }
}

/// Latest known patch for one product (or for the agent)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchDescriptor {
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    pub download_url: String,
    pub target_type: TargetType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
}

/// The catalog's record of this agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub agent_id: String,
    #[serde(default)]
    pub current_version: Option<String>,
}

impl AgentRecord {
    pub fn current_version(&self) -> &str {
        self.current_version.as_deref().unwrap_or(UNKNOWN_VERSION)
    }
}

/// Immutable record of a patch outcome, appended to the catalog's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub agent_id: String,
    pub product_name: String,
    pub patch_version: String,
    pub target_type: TargetType,
    pub status: PatchStatus,
    pub timestamp: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(
        agent_id: &str,
        product_name: &str,
        patch_version: &str,
        target_type: TargetType,
        status: PatchStatus,
    ) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            product_name: product_name.to_string(),
            patch_version: patch_version.to_string(),
            target_type,
            status,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateAgentVersionRequest<'a> {
    pub agent_id: &'a str,
    pub current_version: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateProductVersionRequest<'a> {
    pub agent_id: &'a str,
    pub monitored_product: &'a str,
    pub current_version: &'a str,
}
