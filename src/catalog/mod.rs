//! Access to the remote patch catalog
//!
//! The agent reads monitored products, latest patches and its own record
//! from the catalog, and writes version updates and status events back.
//! Everything goes through the [`client::Catalog`] trait so the
//! orchestrator never depends on the transport.
//!
//! # Modules
//!
//! - [`client`]: `Catalog` trait (mockable in tests)
//! - [`http`]: reqwest-based implementation of the catalog's REST API
//! - [`types`]: Wire types (products, patch descriptors, status events)
//! - [`error`]: Error types for catalog operations

pub mod client;
pub mod error;
pub mod http;
pub mod types;

pub use client::Catalog;
pub use error::CatalogError;
pub use http::HttpCatalog;
pub use types::{
    AgentRecord, MonitoredProduct, PatchDescriptor, PatchStatus, StatusEvent, TargetType,
};
