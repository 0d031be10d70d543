use thiserror::Error;

use crate::catalog::error::CatalogError;
use crate::patch::error::PipelineError;
use crate::version::error::StoreError;

/// Why one step of a cycle (the self-update or one product) did not finish
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Catalog request failed: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Patch pipeline failed: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Failed to record local version: {0}")]
    Store(#[from] StoreError),

    #[error("Cycle cancelled")]
    Cancelled,
}

impl CycleError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, CycleError::Cancelled)
    }
}
