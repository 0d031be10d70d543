//! Durable per-product version records kept on the agent machine

use std::path::{Path, PathBuf};

#[cfg(test)]
use mockall::automock;
use tracing::{debug, warn};

use crate::config::{self, LOCAL_CHECK_DIR_NAME, UNKNOWN_VERSION};
use crate::version::error::StoreError;

/// Trait for reading and writing the locally recorded version of a product
#[cfg_attr(test, automock)]
pub trait LocalVersionStore: Send + Sync + 'static {
    /// Get the recorded version, or "0.0.0" when nothing usable is stored
    fn read(&self, agent_id: &str, product: &str) -> String;

    /// Overwrite the recorded version
    fn write(&self, agent_id: &str, product: &str, version: &str) -> Result<(), StoreError>;
}

/// Stores one text file per product under
/// `{base}/{agentId}/localcheck/{product}.txt`
#[derive(Debug, Clone)]
pub struct FileVersionStore {
    base: PathBuf,
}

impl FileVersionStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Location of the record, refusing names that would leave
    /// `{base}/{agentId}/localcheck`
    pub fn record_path(&self, agent_id: &str, product: &str) -> Result<PathBuf, StoreError> {
        for name in [agent_id, product] {
            if !config::is_single_component(name) {
                return Err(StoreError::InvalidName(name.to_string()));
            }
        }

        Ok(self
            .base
            .join(agent_id)
            .join(LOCAL_CHECK_DIR_NAME)
            .join(format!("{}.txt", product)))
    }
}

impl LocalVersionStore for FileVersionStore {
    fn read(&self, agent_id: &str, product: &str) -> String {
        let path = match self.record_path(agent_id, product) {
            Ok(path) => path,
            Err(e) => {
                warn!("{}, assuming {}", e, UNKNOWN_VERSION);
                return UNKNOWN_VERSION.to_string();
            }
        };

        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let version = content.trim();
                if version.is_empty() {
                    warn!("Version record {:?} is empty, assuming {}", path, UNKNOWN_VERSION);
                    UNKNOWN_VERSION.to_string()
                } else {
                    version.to_string()
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No version record at {:?}", path);
                UNKNOWN_VERSION.to_string()
            }
            Err(e) => {
                warn!("Failed to read version record {:?}: {}", path, e);
                UNKNOWN_VERSION.to_string()
            }
        }
    }

    fn write(&self, agent_id: &str, product: &str, version: &str) -> Result<(), StoreError> {
        let path = self.record_path(agent_id, product)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                path: path.clone(),
                source,
            })?;
        }

        std::fs::write(&path, version).map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })?;

        debug!("Recorded {} {} at {:?}", product, version, path);
        Ok(())
    }
}
